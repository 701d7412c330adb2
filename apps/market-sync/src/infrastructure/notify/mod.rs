//! Notification Display Adapter
//!
//! [`NotificationDisplay`] implementation that emits alerts as structured
//! log records. Permission is a runtime flag toggled by the host.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::application::ports::{DisplayError, DisplayOptions, NotificationDisplay};

/// Display that writes alerts to the `tracing` pipeline.
#[derive(Debug)]
pub struct TracingDisplay {
    permitted: AtomicBool,
}

impl TracingDisplay {
    /// Create a display with the given initial permission.
    #[must_use]
    pub const fn new(permitted: bool) -> Self {
        Self {
            permitted: AtomicBool::new(permitted),
        }
    }

    /// Grant or revoke display permission.
    pub fn set_permission(&self, permitted: bool) {
        self.permitted.store(permitted, Ordering::Relaxed);
    }
}

impl Default for TracingDisplay {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NotificationDisplay for TracingDisplay {
    fn can_display(&self) -> bool {
        self.permitted.load(Ordering::Relaxed)
    }

    fn display(
        &self,
        title: &str,
        body: &str,
        options: &DisplayOptions,
    ) -> Result<(), DisplayError> {
        if !self.can_display() {
            return Err(DisplayError::PermissionDenied);
        }

        tracing::info!(
            target: "market_sync::alerts",
            title,
            body,
            require_interaction = options.require_interaction,
            "Alert"
        );
        Ok(())
    }
}
