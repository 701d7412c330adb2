#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Market Sync - Real-time Market Data Synchronization
//!
//! Maintains one streaming connection to the market-data gateway, keeps the
//! latest price per symbol in memory and turns risk alerts and
//! recommendations into deduplicated user notifications.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core market data types and state
//!   - `connection`: Connection lifecycle state
//!   - `streaming`: Price ticks, batches, alerts, recommendations
//!   - `subscription`: Subscribed symbol set
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Transport and notification display interfaces
//!   - `services`: Price store, alert gate, observer lists
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `gateway`: Codec, WebSocket transport, connection manager
//!   - `config`: Environment configuration
//!   - `notify`: Log-backed notification display
//!   - `status`: Health, metrics and price HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//!                        ┌────────────────────┐     ┌─────────────┐
//! Market Gateway WS ────►│ ConnectionManager  │────►│ PriceStore  │──► Status HTTP
//!          ▲             │ (codec, reconnect) │     └─────────────┘
//!          │             └────────────────────┘     ┌─────────────┐
//!          └── subscribe / replay      │       ────►│  AlertGate  │──► Display
//!                                      ▼            └─────────────┘
//!                             connection observers
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core market data types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::connection::ConnectionState;
pub use domain::streaming::{GatewayError, PriceBatch, PriceTick, Recommendation, RiskAlert};
pub use domain::subscription::{SubscriptionSet, Symbol};

// Ports
pub use application::ports::{
    DisplayError, DisplayOptions, NotificationDisplay, Transport, TransportConnection,
    TransportError,
};

// Services
pub use application::services::{
    AlertGate, AlertGateConfig, AlertPriority, Disposer, NotifyOutcome, PriceSnapshot, PriceStore,
};

// Gateway client
pub use infrastructure::gateway::{
    ConnectionManager, GatewayCodec, ReconnectConfig, WebSocketTransport,
};

// Infrastructure config
pub use infrastructure::config::{
    AlertSettings, ConfigError, GatewaySettings, ServerSettings, SyncConfig,
};

// Notification display
pub use infrastructure::notify::TracingDisplay;

// Status server
pub use infrastructure::status::{StatusServer, StatusServerError, StatusServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
