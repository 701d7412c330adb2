//! Market Data Streaming Types
//!
//! Core domain types for market data: price ticks, price batches, risk
//! alerts and recommendations. These types are codec-agnostic and represent
//! the canonical internal representation of gateway events.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::subscription::Symbol;

// =============================================================================
// Prices
// =============================================================================

/// One price observation for a symbol.
///
/// A newer tick for the same symbol replaces the previous one; no history
/// is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTick {
    /// Instrument symbol.
    pub symbol: Symbol,
    /// Last price.
    pub price: Decimal,
    /// Absolute change since the previous close.
    pub change: Decimal,
    /// Percentage change since the previous close.
    pub change_percent: Decimal,
    /// Time of the observation.
    pub timestamp: DateTime<Utc>,
}

impl PriceTick {
    /// Create a new tick.
    #[must_use]
    pub fn new(
        symbol: impl Into<Symbol>,
        price: Decimal,
        change: Decimal,
        change_percent: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change,
            change_percent,
            timestamp,
        }
    }
}

/// A group of ticks delivered together in one frame.
///
/// Ticks are kept in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceBatch {
    /// Gateway timestamp of the batch.
    pub timestamp: DateTime<Utc>,
    /// Ticks in arrival order.
    pub ticks: Vec<PriceTick>,
}

impl PriceBatch {
    /// Create a batch from ticks.
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>, ticks: Vec<PriceTick>) -> Self {
        Self { timestamp, ticks }
    }

    /// Wrap a single tick into a one-entry batch stamped with the tick time.
    #[must_use]
    pub fn single(tick: PriceTick) -> Self {
        Self {
            timestamp: tick.timestamp,
            ticks: vec![tick],
        }
    }

    /// Number of ticks in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    /// Whether the batch carries no ticks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

// =============================================================================
// Alerts
// =============================================================================

/// Portfolio risk alert pushed by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAlert {
    /// Alert category (e.g. `concentration`, `drawdown`).
    pub alert_type: String,
    /// Human readable description.
    pub message: String,
    /// Time the alert was raised.
    pub timestamp: DateTime<Utc>,
}

/// Trading recommendation pushed by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    /// Instrument symbol.
    pub symbol: Symbol,
    /// Suggested action (e.g. `buy`, `hold`, `sell`).
    pub action: String,
    /// Model confidence as a fraction in `[0, 1]`.
    pub confidence: f64,
    /// Time the recommendation was produced.
    pub timestamp: DateTime<Utc>,
}

impl Recommendation {
    /// Confidence expressed as a whole percentage, clamped to `0..=100`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn confidence_percent(&self) -> u8 {
        (self.confidence * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

/// Error reported by the gateway, typically a rejected subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    /// Gateway error code, if provided.
    pub code: Option<i32>,
    /// Error description.
    pub message: String,
}
