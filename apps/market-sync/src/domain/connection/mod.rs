//! Connection Lifecycle State
//!
//! The state machine the connection manager drives. Consumers only see the
//! state and the derived "connected" boolean, never raw transport errors.

use serde::Serialize;

/// Lifecycle state of the gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection and none wanted.
    #[default]
    Disconnected,
    /// An explicit connect is opening the transport.
    Connecting,
    /// Connected and streaming.
    Connected,
    /// Waiting for (or running) a scheduled reconnect attempt.
    Reconnecting,
    /// Reconnect attempts exhausted; only an explicit connect retries.
    FailedPermanently,
}

impl ConnectionState {
    /// Whether the gateway connection is live.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether a connection is being established or re-established.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }

    /// State name for logs and status endpoints.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::FailedPermanently => "failed_permanently",
        }
    }

    /// Numeric encoding for the connection state gauge.
    #[must_use]
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Disconnected => 0.0,
            Self::Connecting => 1.0,
            Self::Connected => 2.0,
            Self::Reconnecting => 3.0,
            Self::FailedPermanently => 4.0,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
