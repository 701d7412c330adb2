//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Frames**: Gateway frames received by kind, decode and gateway errors
//! - **Connection**: Connection state and reconnect attempts
//! - **Prices**: Ticks applied and symbols tracked
//! - **Alerts**: Alert gate outcomes
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the status server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::application::services::NotifyOutcome;
use crate::domain::connection::ConnectionState;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first one.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Frame counters
    describe_counter!(
        "market_sync_frames_received_total",
        "Total decoded gateway messages by kind"
    );
    describe_counter!(
        "market_sync_decode_errors_total",
        "Total gateway frames dropped as malformed"
    );
    describe_counter!(
        "market_sync_gateway_errors_total",
        "Total error frames reported by the gateway"
    );

    // Connection
    describe_gauge!(
        "market_sync_connection_state",
        "Connection state (0=disconnected, 1=connecting, 2=connected, 3=reconnecting, 4=failed)"
    );
    describe_counter!(
        "market_sync_reconnects_total",
        "Total gateway reconnection attempts"
    );
    describe_gauge!(
        "market_sync_subscribed_symbols",
        "Number of symbols in the subscription set"
    );

    // Prices
    describe_counter!(
        "market_sync_ticks_applied_total",
        "Total price ticks applied to the snapshot"
    );
    describe_gauge!(
        "market_sync_tracked_symbols",
        "Number of symbols with a current price"
    );

    // Alerts
    describe_counter!(
        "market_sync_alerts_total",
        "Alerts passed to the alert gate by outcome"
    );

    // Latency histograms
    describe_histogram!(
        "market_sync_frame_processing_seconds",
        "Time to decode a gateway frame and dispatch it to observers"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a decoded gateway message.
pub fn record_frame_received(kind: &'static str) {
    counter!("market_sync_frames_received_total", "kind" => kind).increment(1);
}

/// Record a malformed gateway frame.
pub fn record_decode_error() {
    counter!("market_sync_decode_errors_total").increment(1);
}

/// Record a gateway `error` frame.
pub fn record_gateway_error() {
    counter!("market_sync_gateway_errors_total").increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect() {
    counter!("market_sync_reconnects_total").increment(1);
}

/// Update the connection state gauge.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("market_sync_connection_state").set(state.as_gauge());
}

/// Update the subscription set size.
pub fn set_subscribed_symbols(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    let count = count as f64;
    gauge!("market_sync_subscribed_symbols").set(count);
}

/// Record ticks applied to the price snapshot and the resulting symbol count.
pub fn record_ticks_applied(ticks: usize, tracked_symbols: usize) {
    counter!("market_sync_ticks_applied_total").increment(ticks as u64);
    #[allow(clippy::cast_precision_loss)]
    let tracked_symbols = tracked_symbols as f64;
    gauge!("market_sync_tracked_symbols").set(tracked_symbols);
}

/// Record an alert gate outcome.
pub fn record_alert(outcome: NotifyOutcome) {
    counter!("market_sync_alerts_total", "outcome" => outcome.as_str()).increment(1);
}

/// Record frame processing duration.
pub fn record_frame_processing(duration: Duration) {
    histogram!("market_sync_frame_processing_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
