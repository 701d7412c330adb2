//! Gateway WebSocket Message Types
//!
//! Wire format types for the market gateway stream. Every inbound frame is
//! an envelope `{"type": ..., "data": {...}}` or a JSON array of envelopes.
//!
//! # Message Types
//!
//! ## Data Messages
//! - `price_batch`: Several price ticks sharing one gateway timestamp
//! - `price_update`: A single price tick
//! - `risk_alert`: Portfolio risk alert
//! - `recommendation`: Trading recommendation
//!
//! ## Control Messages
//! - `subscribed`: Subscription acknowledgment
//! - `error`: Gateway error (e.g. rejected subscription)
//!
//! ## Client Messages
//! - `subscribe` / `unsubscribe` with a `symbols` list
//!
//! Timestamps are accepted as RFC 3339 strings or as integer Unix epoch
//! milliseconds. A missing timestamp is filled in with the receive time.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::streaming::{GatewayError, PriceBatch, PriceTick, Recommendation, RiskAlert};

// =============================================================================
// Timestamps
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(DateTime<Utc>),
    Millis(i64),
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawTimestamp>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawTimestamp::Text(ts)) => Ok(Some(ts)),
        Some(RawTimestamp::Millis(ms)) => DateTime::from_timestamp_millis(ms)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {ms}"))),
    }
}

// =============================================================================
// Inbound Payloads
// =============================================================================

/// Payload of a `price_batch` frame.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "timestamp": "2024-03-15T10:00:00Z",
///   "prices": [
///     {"symbol": "SBER", "price": 105, "change": 5, "changePercent": 5,
///      "timestamp": "2024-03-15T10:00:00Z"}
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PriceBatchData {
    /// Batch timestamp
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Ticks in gateway order
    #[serde(default)]
    pub prices: Vec<PriceEntry>,
}

/// One entry of a `price_batch` frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEntry {
    /// Instrument symbol
    pub symbol: String,

    /// Last price
    pub price: Decimal,

    /// Absolute change
    #[serde(default)]
    pub change: Decimal,

    /// Percentage change
    #[serde(default)]
    pub change_percent: Decimal,

    /// Tick timestamp; falls back to the batch timestamp
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Payload of a `price_update` frame.
///
/// # Wire Format (JSON)
/// ```json
/// {"symbol": "SBER", "currentPrice": 105, "change": 5, "changePercent": 5,
///  "timestamp": 1710496800000}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdateData {
    /// Instrument symbol
    pub symbol: String,

    /// Last price
    pub current_price: Decimal,

    /// Absolute change
    #[serde(default)]
    pub change: Decimal,

    /// Percentage change
    #[serde(default)]
    pub change_percent: Decimal,

    /// Tick timestamp
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Payload of a `risk_alert` frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RiskAlertData {
    /// Alert category
    #[serde(rename = "type")]
    pub alert_type: String,

    /// Human readable description
    pub message: String,

    /// Time the alert was raised
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Payload of a `recommendation` frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecommendationData {
    /// Instrument symbol
    pub symbol: String,

    /// Suggested action
    pub recommendation: String,

    /// Confidence in `[0, 1]`
    pub confidence: f64,

    /// Time the recommendation was produced
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Payload of a `subscribed` acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscribedData {
    /// Symbols the gateway now streams
    #[serde(default)]
    pub symbols: Vec<String>,
}

/// Payload of an `error` frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorData {
    /// Error code
    #[serde(default)]
    pub code: Option<i32>,

    /// Error message
    pub message: String,
}

// =============================================================================
// Conversions
// =============================================================================

impl PriceBatchData {
    /// Convert into a domain batch, stamping missing times with `received_at`.
    #[must_use]
    pub fn into_batch(self, received_at: DateTime<Utc>) -> PriceBatch {
        let batch_ts = self.timestamp.unwrap_or(received_at);
        let ticks = self
            .prices
            .into_iter()
            .map(|entry| {
                PriceTick::new(
                    entry.symbol,
                    entry.price,
                    entry.change,
                    entry.change_percent,
                    entry.timestamp.unwrap_or(batch_ts),
                )
            })
            .collect();
        PriceBatch::new(batch_ts, ticks)
    }
}

impl PriceUpdateData {
    /// Normalize a single update into a one-entry batch.
    #[must_use]
    pub fn into_batch(self, received_at: DateTime<Utc>) -> PriceBatch {
        PriceBatch::single(PriceTick::new(
            self.symbol,
            self.current_price,
            self.change,
            self.change_percent,
            self.timestamp.unwrap_or(received_at),
        ))
    }
}

impl RiskAlertData {
    /// Convert into a domain alert.
    #[must_use]
    pub fn into_alert(self, received_at: DateTime<Utc>) -> RiskAlert {
        RiskAlert {
            alert_type: self.alert_type,
            message: self.message,
            timestamp: self.timestamp.unwrap_or(received_at),
        }
    }
}

impl RecommendationData {
    /// Convert into a domain recommendation.
    #[must_use]
    pub fn into_recommendation(self, received_at: DateTime<Utc>) -> Recommendation {
        Recommendation {
            symbol: self.symbol,
            action: self.recommendation,
            confidence: self.confidence,
            timestamp: self.timestamp.unwrap_or(received_at),
        }
    }
}

impl From<ErrorData> for GatewayError {
    fn from(data: ErrorData) -> Self {
        Self {
            code: data.code,
            message: data.message,
        }
    }
}

// =============================================================================
// Decoded Message
// =============================================================================

/// A decoded inbound gateway message.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayMessage {
    /// Price ticks (single updates are normalized into one-entry batches)
    Prices(PriceBatch),
    /// Risk alert
    RiskAlert(RiskAlert),
    /// Recommendation
    Recommendation(Recommendation),
    /// Subscription acknowledgment
    Subscribed(Vec<String>),
    /// Gateway error
    Error(GatewayError),
}

impl GatewayMessage {
    /// Short label used for metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Prices(_) => "prices",
            Self::RiskAlert(_) => "risk_alert",
            Self::Recommendation(_) => "recommendation",
            Self::Subscribed(_) => "subscribed",
            Self::Error(_) => "error",
        }
    }
}

// =============================================================================
// Client Messages
// =============================================================================

/// Message sent to the gateway.
///
/// # Wire Format (JSON)
/// ```json
/// {"type": "subscribe", "symbols": ["GAZP", "SBER"]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start streaming symbols
    Subscribe {
        /// Symbols to add
        symbols: Vec<String>,
    },
    /// Stop streaming symbols
    Unsubscribe {
        /// Symbols to remove
        symbols: Vec<String>,
    },
}

impl ClientMessage {
    /// Create a subscribe request.
    #[must_use]
    pub const fn subscribe(symbols: Vec<String>) -> Self {
        Self::Subscribe { symbols }
    }

    /// Create an unsubscribe request.
    #[must_use]
    pub const fn unsubscribe(symbols: Vec<String>) -> Self {
        Self::Unsubscribe { symbols }
    }

    /// Symbols carried by the request.
    #[must_use]
    pub fn symbols(&self) -> &[String] {
        match self {
            Self::Subscribe { symbols } | Self::Unsubscribe { symbols } => symbols,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn received_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn deserialize_price_entry_with_rfc3339_timestamp() {
        let json = r#"{"symbol":"SBER","price":105.5,"change":5,"changePercent":4.97,"timestamp":"2024-03-15T10:00:00Z"}"#;
        let entry: PriceEntry = serde_json::from_str(json).unwrap();

        assert_eq!(entry.symbol, "SBER");
        assert_eq!(entry.price, Decimal::new(1055, 1));
        assert_eq!(entry.change_percent, Decimal::new(497, 2));
        assert_eq!(
            entry.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn deserialize_epoch_millis_timestamp() {
        let json = r#"{"symbol":"SBER","currentPrice":"100","timestamp":1710496800000}"#;
        let update: PriceUpdateData = serde_json::from_str(json).unwrap();

        assert_eq!(
            update.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap())
        );
        assert_eq!(update.change, Decimal::ZERO);
    }

    #[test]
    fn rejects_malformed_timestamp() {
        let json = r#"{"symbol":"SBER","currentPrice":100,"timestamp":"yesterday"}"#;
        assert!(serde_json::from_str::<PriceUpdateData>(json).is_err());
    }

    #[test]
    fn batch_entries_inherit_batch_timestamp() {
        let json = r#"{"timestamp":"2024-03-15T10:00:00Z","prices":[{"symbol":"GAZP","price":170}]}"#;
        let data: PriceBatchData = serde_json::from_str(json).unwrap();

        let batch = data.into_batch(received_at());

        let expected = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        assert_eq!(batch.timestamp, expected);
        assert_eq!(batch.ticks[0].timestamp, expected);
    }

    #[test]
    fn missing_timestamps_use_receive_time() {
        let json = r#"{"type":"drawdown","message":"Portfolio down 5%"}"#;
        let data: RiskAlertData = serde_json::from_str(json).unwrap();

        let alert = data.into_alert(received_at());

        assert_eq!(alert.alert_type, "drawdown");
        assert_eq!(alert.timestamp, received_at());
    }

    #[test]
    fn price_update_becomes_single_entry_batch() {
        let json = r#"{"symbol":"LKOH","currentPrice":7000,"change":-10,"changePercent":-0.14,"timestamp":1710496800000}"#;
        let data: PriceUpdateData = serde_json::from_str(json).unwrap();

        let batch = data.into_batch(received_at());

        assert_eq!(batch.len(), 1);
        assert_eq!(batch.ticks[0].symbol, "LKOH");
        assert_eq!(batch.ticks[0].price, Decimal::from(7000));
        assert_eq!(batch.timestamp, batch.ticks[0].timestamp);
    }

    #[test]
    fn serialize_client_messages() {
        let subscribe = ClientMessage::subscribe(vec!["GAZP".to_string(), "SBER".to_string()]);
        assert_eq!(
            serde_json::to_string(&subscribe).unwrap(),
            r#"{"type":"subscribe","symbols":["GAZP","SBER"]}"#
        );

        let unsubscribe = ClientMessage::unsubscribe(vec!["SBER".to_string()]);
        assert_eq!(
            serde_json::to_string(&unsubscribe).unwrap(),
            r#"{"type":"unsubscribe","symbols":["SBER"]}"#
        );
    }
}
