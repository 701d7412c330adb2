//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `Transport`: Opens the streaming connection to the market gateway
//! - `NotificationDisplay`: Shows user-facing alerts

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Sink, Stream};

// =============================================================================
// Transport Port
// =============================================================================

/// Errors raised by a transport.
///
/// These never reach callers of the connection manager; they are
/// translated into connection state transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be opened.
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// The connection dropped or the peer closed it.
    #[error("connection closed")]
    Closed,

    /// A frame could not be written.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// A frame could not be read.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Outbound half of a connection: text frames to the gateway.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Inbound half of a connection: text frames from the gateway.
///
/// The stream ending or yielding an error means the connection is gone.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// An open gateway connection.
pub struct TransportConnection {
    /// Frames to the gateway.
    pub sink: FrameSink,
    /// Frames from the gateway.
    pub stream: FrameStream,
}

impl TransportConnection {
    /// Bundle a sink and a stream into a connection.
    pub fn new<W, R>(sink: W, stream: R) -> Self
    where
        W: Sink<String, Error = TransportError> + Send + 'static,
        R: Stream<Item = Result<String, TransportError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

impl std::fmt::Debug for TransportConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConnection").finish_non_exhaustive()
    }
}

/// Opens connections to the market gateway.
///
/// A connect attempt that never completes must eventually fail inside the
/// transport; callers impose no extra timeout.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a new connection.
    async fn open(&self) -> Result<TransportConnection, TransportError>;

    /// Endpoint description for logs.
    fn endpoint(&self) -> &str;
}

// =============================================================================
// Notification Display Port
// =============================================================================

/// Presentation options passed with every alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayOptions {
    /// Keep the alert on screen until the user dismisses it.
    pub require_interaction: bool,
    /// Replacement tag; alerts sharing a tag replace each other.
    pub tag: String,
}

/// Errors raised by the display collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisplayError {
    /// Display permission was not granted.
    #[error("display permission denied")]
    PermissionDenied,

    /// The display backend failed.
    #[error("display failed: {0}")]
    Failed(String),
}

/// Capability to show user-facing alerts.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationDisplay: Send + Sync {
    /// Whether alerts may be shown right now.
    fn can_display(&self) -> bool;

    /// Show an alert.
    ///
    /// # Errors
    ///
    /// Returns `DisplayError` if the alert could not be shown.
    fn display(&self, title: &str, body: &str, options: &DisplayOptions)
    -> Result<(), DisplayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_messages() {
        assert_eq!(TransportError::Closed.to_string(), "connection closed");
        assert_eq!(
            TransportError::ConnectFailed("refused".to_string()).to_string(),
            "connection failed: refused"
        );
    }

    #[test]
    fn display_error_messages() {
        assert_eq!(
            DisplayError::PermissionDenied.to_string(),
            "display permission denied"
        );
    }
}
