//! Status Endpoint
//!
//! HTTP endpoint for health checks, connection status, Prometheus metrics and
//! read-only access to the price snapshot.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness check (simple OK)
//! - `GET /readyz` - Kubernetes readiness check (gateway connected)
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /prices` - Whole price snapshot
//! - `GET /prices/{symbol}` - Current tick for one symbol

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::PriceStore;
use crate::domain::connection::ConnectionState;
use crate::domain::streaming::PriceTick;
use crate::infrastructure::gateway::ConnectionManager;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Gateway connection status.
    pub connection: ConnectionInfo,
    /// Price snapshot summary.
    pub prices: PricesInfo,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Gateway connected.
    Healthy,
    /// Gateway connection being (re)established.
    Degraded,
    /// Gateway disconnected or given up on.
    Unhealthy,
}

impl From<ConnectionState> for HealthStatus {
    fn from(state: ConnectionState) -> Self {
        if state.is_connected() {
            Self::Healthy
        } else if state.is_pending() {
            Self::Degraded
        } else {
            Self::Unhealthy
        }
    }
}

/// Gateway connection status.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    /// Gateway endpoint.
    pub endpoint: String,
    /// Connection state.
    pub state: ConnectionState,
    /// Whether the gateway is connected.
    pub connected: bool,
    /// Reconnect attempts since the last successful open.
    pub reconnect_attempts: u32,
    /// Subscribed symbols.
    pub subscriptions: Vec<String>,
}

/// Price snapshot summary.
#[derive(Debug, Clone, Serialize)]
pub struct PricesInfo {
    /// Symbols with a current tick.
    pub tracked_symbols: usize,
    /// Timestamp of the last applied batch.
    pub last_update: Option<DateTime<Utc>>,
}

/// Whole snapshot response.
#[derive(Debug, Clone, Serialize)]
pub struct PricesResponse {
    /// Timestamp of the last applied batch.
    pub last_update: Option<DateTime<Utc>>,
    /// Ticks sorted by symbol.
    pub prices: Vec<PriceTick>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

// =============================================================================
// Status Server State
// =============================================================================

/// Shared state for the status server.
pub struct StatusServerState {
    version: String,
    started_at: Instant,
    manager: ConnectionManager,
    store: Arc<PriceStore>,
}

impl StatusServerState {
    /// Create new status server state.
    #[must_use]
    pub fn new(version: String, manager: ConnectionManager, store: Arc<PriceStore>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            manager,
            store,
        }
    }
}

// =============================================================================
// Status Server
// =============================================================================

/// Build the status router.
pub fn router(state: Arc<StatusServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .route("/prices", get(prices_handler))
        .route("/prices/{symbol}", get(price_handler))
        .with_state(state)
}

/// Status HTTP server.
pub struct StatusServer {
    port: u16,
    state: Arc<StatusServerState>,
    cancel: CancellationToken,
}

impl StatusServer {
    /// Create a new status server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<StatusServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the status server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `StatusServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), StatusServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| StatusServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Status server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| StatusServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Status server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<StatusServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<StatusServerState>>) -> impl IntoResponse {
    if state.manager.is_connected() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

async fn prices_handler(State(state): State<Arc<StatusServerState>>) -> Json<PricesResponse> {
    let (snapshot, last_update) = state.store.snapshot();
    let mut prices: Vec<PriceTick> = snapshot.values().cloned().collect();
    prices.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    Json(PricesResponse {
        last_update,
        prices,
    })
}

async fn price_handler(
    State(state): State<Arc<StatusServerState>>,
    Path(symbol): Path<String>,
) -> Response {
    match state.store.read(&symbol) {
        Some(tick) => Json(tick).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: format!("no price for {symbol}"),
            }),
        )
            .into_response(),
    }
}

fn build_health_response(state: &StatusServerState) -> HealthResponse {
    let connection_state = state.manager.state();

    HealthResponse {
        status: connection_state.into(),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        connection: ConnectionInfo {
            endpoint: state.manager.endpoint().to_string(),
            state: connection_state,
            connected: connection_state.is_connected(),
            reconnect_attempts: state.manager.reconnect_attempts(),
            subscriptions: state.manager.subscriptions(),
        },
        prices: PricesInfo {
            tracked_symbols: state.store.len(),
            last_update: state.store.last_update(),
        },
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Status server errors.
#[derive(Debug, thiserror::Error)]
pub enum StatusServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
