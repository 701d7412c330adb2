//! Market Sync Binary
//!
//! Connects to the market gateway, keeps the price snapshot current and
//! gates user-facing alerts.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin market-sync
//! ```
//!
//! # Environment Variables
//!
//! - `MARKET_GATEWAY_URL`: Gateway WebSocket URL (default: ws://127.0.0.1:8000/ws/market)
//! - `MARKET_SYMBOLS`: Comma-separated initial subscription (default: none)
//! - `SYNC_RECONNECT_BASE_DELAY_MS`: Linear backoff unit (default: 3000)
//! - `SYNC_MAX_RECONNECT_ATTEMPTS`: Retries before giving up (default: 5)
//! - `ALERT_COOLDOWN_SECS`: Alert deduplication window (default: 30)
//! - `ALERT_RETENTION_SECS`: Notification record lifetime (default: 300)
//! - `NOTIFICATIONS_ENABLED`: Initial display permission (default: true)
//! - `SYNC_STATUS_PORT`: Status HTTP port (default: 8083)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: market-sync)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use market_sync::application::services::{AlertGate, AlertGateConfig, PriceStore};
use market_sync::infrastructure::gateway::{
    ConnectionManager, ReconnectConfig, WebSocketTransport,
};
use market_sync::infrastructure::notify::TracingDisplay;
use market_sync::infrastructure::status::{StatusServer, StatusServerState};
use market_sync::infrastructure::telemetry;
use market_sync::{SyncConfig, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Market Sync");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = SyncConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Gateway connection
    let transport = Arc::new(WebSocketTransport::new(config.gateway.url.clone()));
    let manager = ConnectionManager::new(
        transport,
        ReconnectConfig::from_gateway_settings(&config.gateway),
    );

    // Price snapshot
    let store = Arc::new(PriceStore::new());
    let _store_observer = manager.attach_price_store(&store);

    // Alert gate
    let display = Arc::new(TracingDisplay::new(config.alerts.notifications_enabled));
    let gate = Arc::new(AlertGate::new(
        AlertGateConfig::from(&config.alerts),
        display,
    ));
    let _gate_observers = manager.attach_alert_gate(&gate);

    let _error_observer = manager.on_gateway_error(|error| {
        tracing::warn!(code = ?error.code, message = %error.message, "Gateway rejected a request");
    });

    manager.subscribe(config.symbols.iter().cloned());

    // Status server
    let status_state = Arc::new(StatusServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        manager.clone(),
        Arc::clone(&store),
    ));
    let status_server = StatusServer::new(
        config.server.status_port,
        status_state,
        shutdown_token.clone(),
    );
    let status_handle = tokio::spawn(async move {
        if let Err(e) = status_server.run().await {
            tracing::error!(error = %e, "Status server error");
        }
    });

    manager.connect().await;

    tracing::info!(state = %manager.state(), "Market sync ready");

    await_shutdown(shutdown_token).await;

    manager.disconnect();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, status_handle)
        .await
        .is_err()
    {
        tracing::warn!("Status server did not stop before the shutdown timeout");
    }

    tracing::info!("Market sync stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &SyncConfig) {
    tracing::info!(
        gateway_url = %config.gateway.url,
        symbols = config.symbols.len(),
        status_port = config.server.status_port,
        "Configuration loaded"
    );
    tracing::debug!(
        reconnect_base_delay_ms = config.gateway.reconnect_base_delay.as_millis(),
        max_reconnect_attempts = config.gateway.max_reconnect_attempts,
        alert_cooldown_secs = config.alerts.cooldown.as_secs(),
        alert_retention_secs = config.alerts.retention.as_secs(),
        notifications_enabled = config.alerts.notifications_enabled,
        "Sync settings"
    );
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
