//! Alert Gate
//!
//! Suppresses alert storms. An alert is keyed by the exact composite of its
//! title and body; the same key is shown at most once per cooldown window.
//! Records expire through a delayed eviction scheduled when the alert is
//! shown, so memory stays bounded in long sessions without a sweep pass.
//!
//! Keys are exact strings: near-duplicate phrasing is not coalesced.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::application::ports::{DisplayOptions, NotificationDisplay};
use crate::domain::streaming::{Recommendation, RiskAlert};

/// Default minimum time between two displays of the same alert.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

/// Default lifetime of a notification record.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(300);

// =============================================================================
// Configuration
// =============================================================================

/// Cooldown and retention windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertGateConfig {
    /// Minimum time between two displays of the same key.
    pub cooldown: Duration,
    /// Time after which a record is evicted.
    pub retention: Duration,
}

impl Default for AlertGateConfig {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            retention: DEFAULT_RETENTION,
        }
    }
}

// =============================================================================
// Types
// =============================================================================

/// Urgency of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertPriority {
    /// Informational.
    Low,
    /// Regular alert.
    #[default]
    Normal,
    /// Needs attention.
    High,
    /// Needs immediate attention.
    Critical,
}

impl AlertPriority {
    /// Whether the alert should stay visible until dismissed.
    #[must_use]
    pub const fn requires_interaction(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// What happened to an alert passed to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Forwarded to the display.
    Displayed,
    /// Same key shown within the cooldown window; dropped.
    Suppressed,
    /// The display may not show alerts right now; dropped.
    Unavailable,
    /// The display failed; dropped.
    Failed,
}

impl NotifyOutcome {
    /// Lowercase outcome name, used as a metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Displayed => "displayed",
            Self::Suppressed => "suppressed",
            Self::Unavailable => "unavailable",
            Self::Failed => "failed",
        }
    }
}

fn composite_key(title: &str, body: &str) -> String {
    format!("{title}\n{body}")
}

// =============================================================================
// Alert Gate
// =============================================================================

/// Cooldown gate in front of the notification display.
pub struct AlertGate {
    config: AlertGateConfig,
    display: Arc<dyn NotificationDisplay>,
    records: Arc<Mutex<HashMap<String, Instant>>>,
}

impl AlertGate {
    /// Create a gate in front of a display.
    #[must_use]
    pub fn new(config: AlertGateConfig, display: Arc<dyn NotificationDisplay>) -> Self {
        Self {
            config,
            display,
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Gate a risk alert as `"Risk Alert: <type>"` with high priority.
    pub fn notify_risk_alert(&self, alert: &RiskAlert) -> NotifyOutcome {
        let title = format!("Risk Alert: {}", alert.alert_type);
        self.maybe_notify(&title, &alert.message, AlertPriority::High)
    }

    /// Gate a recommendation as `"<SYMBOL>: <ACTION>"` with its confidence.
    pub fn notify_recommendation(&self, rec: &Recommendation) -> NotifyOutcome {
        let title = format!("{}: {}", rec.symbol, rec.action.to_uppercase());
        let body = format!("Confidence: {}%", rec.confidence_percent());
        self.maybe_notify(&title, &body, AlertPriority::Normal)
    }

    /// Show the alert unless the same title and body were shown within the
    /// cooldown window. Never fails; the outcome is informational.
    pub fn maybe_notify(&self, title: &str, body: &str, priority: AlertPriority) -> NotifyOutcome {
        if !self.display.can_display() {
            tracing::debug!(title, "Alert dropped, display unavailable");
            return NotifyOutcome::Unavailable;
        }

        let key = composite_key(title, body);
        let now = Instant::now();

        {
            let mut records = self.records.lock();
            if let Some(last_sent) = records.get(&key)
                && now.saturating_duration_since(*last_sent) <= self.config.cooldown
            {
                tracing::debug!(title, "Alert suppressed by cooldown");
                return NotifyOutcome::Suppressed;
            }
            records.insert(key.clone(), now);
        }

        let options = DisplayOptions {
            require_interaction: priority.requires_interaction(),
            tag: key.clone(),
        };

        if let Err(e) = self.display.display(title, body, &options) {
            tracing::warn!(error = %e, title, "Failed to display alert");
            let mut records = self.records.lock();
            if records.get(&key) == Some(&now) {
                records.remove(&key);
            }
            return NotifyOutcome::Failed;
        }

        self.schedule_eviction(key, now);
        NotifyOutcome::Displayed
    }

    /// Evict the record once the retention window has passed, unless a
    /// newer display replaced it in the meantime.
    fn schedule_eviction(&self, key: String, sent_at: Instant) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime available, notification record kept");
            return;
        };

        let Some(deadline) = sent_at.checked_add(self.config.retention) else {
            tracing::debug!(
                retention_secs = self.config.retention.as_secs(),
                "Retention beyond clock range, notification record kept"
            );
            return;
        };
        let records = Arc::downgrade(&self.records);

        runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(records) = records.upgrade() {
                let mut records = records.lock();
                if records.get(&key) == Some(&sent_at) {
                    records.remove(&key);
                }
            }
        });
    }

    /// Number of live notification records.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.records.lock().len()
    }

    /// The gate configuration.
    #[must_use]
    pub const fn config(&self) -> &AlertGateConfig {
        &self.config
    }
}

impl std::fmt::Debug for AlertGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertGate")
            .field("config", &self.config)
            .field("tracked_keys", &self.tracked_keys())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
