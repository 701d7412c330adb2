//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Market gateway client: codec, WebSocket transport, connection manager.
pub mod gateway;

/// Configuration loading.
pub mod config;

/// Notification display adapters.
pub mod notify;

/// Status HTTP endpoint (health, metrics, price reads).
pub mod status;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
