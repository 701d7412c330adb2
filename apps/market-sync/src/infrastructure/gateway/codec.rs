//! Gateway Codec
//!
//! Decodes gateway frames into [`GatewayMessage`]s and encodes client
//! requests. A frame is either one envelope object or an array of
//! envelopes; each envelope carries a `type` tag and a `data` payload.
//!
//! Example:
//! ```json
//! [{"type":"price_update","data":{"symbol":"SBER","currentPrice":105}}]
//! ```

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::infrastructure::gateway::messages::{
    ClientMessage, ErrorData, GatewayMessage, PriceBatchData, PriceUpdateData,
    RecommendationData, RiskAlertData, SubscribedData,
};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown message type.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// Envelope without a `type` tag.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Invalid message format.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// JSON codec for the gateway stream.
#[derive(Debug, Default, Clone)]
pub struct GatewayCodec;

impl GatewayCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame, stamping missing timestamps with the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON parsing fails or any envelope is invalid. A
    /// frame is decoded entirely or not at all.
    pub fn decode(&self, text: &str) -> Result<Vec<GatewayMessage>, CodecError> {
        self.decode_at(text, Utc::now())
    }

    /// Decode a text frame with an explicit receive time.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON parsing fails or any envelope is invalid.
    pub fn decode_at(
        &self,
        text: &str,
        received_at: DateTime<Utc>,
    ) -> Result<Vec<GatewayMessage>, CodecError> {
        let trimmed = text.trim();

        if trimmed.starts_with('[') {
            let raw_array: Vec<serde_json::Value> = serde_json::from_str(trimmed)?;
            raw_array
                .into_iter()
                .map(|value| Self::decode_envelope(value, received_at))
                .collect()
        } else if trimmed.starts_with('{') {
            let value: serde_json::Value = serde_json::from_str(trimmed)?;
            Ok(vec![Self::decode_envelope(value, received_at)?])
        } else {
            let preview: String = trimmed.chars().take(50).collect();
            Err(CodecError::InvalidFormat(format!(
                "expected JSON array or object, got: {preview}..."
            )))
        }
    }

    fn decode_envelope(
        mut value: serde_json::Value,
        received_at: DateTime<Utc>,
    ) -> Result<GatewayMessage, CodecError> {
        let msg_type = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(CodecError::MissingField("type"))?
            .to_string();

        let data = value
            .get_mut("data")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null);

        let message = match msg_type.as_str() {
            "price_batch" => {
                let m: PriceBatchData = Self::payload(data)?;
                GatewayMessage::Prices(m.into_batch(received_at))
            }
            "price_update" => {
                let m: PriceUpdateData = Self::payload(data)?;
                GatewayMessage::Prices(m.into_batch(received_at))
            }
            "risk_alert" => {
                let m: RiskAlertData = Self::payload(data)?;
                GatewayMessage::RiskAlert(m.into_alert(received_at))
            }
            "recommendation" => {
                let m: RecommendationData = Self::payload(data)?;
                GatewayMessage::Recommendation(m.into_recommendation(received_at))
            }
            "subscribed" => {
                let m: SubscribedData = Self::payload(data)?;
                GatewayMessage::Subscribed(m.symbols)
            }
            "error" => {
                let m: ErrorData = Self::payload(data)?;
                GatewayMessage::Error(m.into())
            }
            other => return Err(CodecError::UnknownMessageType(other.to_string())),
        };

        Ok(message)
    }

    fn payload<T: DeserializeOwned>(data: serde_json::Value) -> Result<T, CodecError> {
        if data.is_null() {
            return Err(CodecError::MissingField("data"));
        }
        Ok(serde_json::from_value(data)?)
    }

    /// Encode a client message to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self, message: &ClientMessage) -> Result<String, CodecError> {
        Ok(serde_json::to_string(message)?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use super::*;

    fn received_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn decode(text: &str) -> Result<Vec<GatewayMessage>, CodecError> {
        GatewayCodec::new().decode_at(text, received_at())
    }

    #[test]
    fn decode_price_batch_keeps_order() {
        let json = r#"{"type":"price_batch","data":{"timestamp":"2024-03-15T10:00:00Z","prices":[
            {"symbol":"SBER","price":100,"change":0,"changePercent":0},
            {"symbol":"GAZP","price":170,"change":1,"changePercent":0.5},
            {"symbol":"SBER","price":101,"change":1,"changePercent":1}
        ]}}"#;

        let messages = decode(json).unwrap();

        let [GatewayMessage::Prices(batch)] = messages.as_slice() else {
            panic!("expected one price batch, got {messages:?}");
        };
        let symbols: Vec<&str> = batch.ticks.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["SBER", "GAZP", "SBER"]);
        assert_eq!(batch.ticks[2].price, Decimal::from(101));
    }

    #[test]
    fn decode_price_update_as_single_batch() {
        let json = r#"{"type":"price_update","data":{"symbol":"SBER","currentPrice":105,"change":5,"changePercent":5,"timestamp":"2024-03-15T10:00:01Z"}}"#;

        let messages = decode(json).unwrap();

        let [GatewayMessage::Prices(batch)] = messages.as_slice() else {
            panic!("expected one price batch, got {messages:?}");
        };
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.ticks[0].price, Decimal::from(105));
        assert_eq!(
            batch.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 1).unwrap()
        );
    }

    #[test]
    fn decode_array_of_mixed_envelopes() {
        let json = r#"[
            {"type":"risk_alert","data":{"type":"concentration","message":"SBER is 40% of portfolio"}},
            {"type":"recommendation","data":{"symbol":"GAZP","recommendation":"buy","confidence":0.85}},
            {"type":"subscribed","data":{"symbols":["SBER"]}},
            {"type":"error","data":{"code":404,"message":"unknown symbol XXXX"}}
        ]"#;

        let messages = decode(json).unwrap();

        let kinds: Vec<&str> = messages.iter().map(GatewayMessage::kind).collect();
        assert_eq!(
            kinds,
            vec!["risk_alert", "recommendation", "subscribed", "error"]
        );
        match &messages[1] {
            GatewayMessage::Recommendation(rec) => {
                assert_eq!(rec.action, "buy");
                assert_eq!(rec.confidence_percent(), 85);
                assert_eq!(rec.timestamp, received_at());
            }
            other => panic!("expected recommendation, got {other:?}"),
        }
        match &messages[3] {
            GatewayMessage::Error(err) => {
                assert_eq!(err.code, Some(404));
                assert_eq!(err.message, "unknown symbol XXXX");
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_an_error() {
        let err = decode(r#"{"type":"heartbeat","data":{}}"#).unwrap_err();
        assert!(matches!(err, CodecError::UnknownMessageType(t) if t == "heartbeat"));
    }

    #[test]
    fn missing_type_is_an_error() {
        let err = decode(r#"{"data":{"symbol":"SBER"}}"#).unwrap_err();
        assert!(matches!(err, CodecError::MissingField("type")));
    }

    #[test]
    fn missing_data_is_an_error() {
        let err = decode(r#"{"type":"price_update"}"#).unwrap_err();
        assert!(matches!(err, CodecError::MissingField("data")));
    }

    #[test]
    fn invalid_payload_is_a_json_error() {
        let err = decode(r#"{"type":"price_update","data":{"symbol":"SBER"}}"#).unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }

    #[test]
    fn one_bad_envelope_rejects_the_whole_frame() {
        let json = r#"[
            {"type":"price_update","data":{"symbol":"SBER","currentPrice":100}},
            {"type":"bogus","data":{}}
        ]"#;
        assert!(decode(json).is_err());
    }

    #[test]
    fn non_json_text_is_invalid_format() {
        let err = decode("not json at all").unwrap_err();
        assert!(matches!(err, CodecError::InvalidFormat(_)));
        assert!(decode("{broken").is_err());
    }

    #[test]
    fn empty_array_decodes_to_nothing() {
        assert!(decode("[]").unwrap().is_empty());
    }

    #[test]
    fn encode_subscribe() {
        let codec = GatewayCodec::new();
        let text = codec
            .encode(&ClientMessage::subscribe(vec!["SBER".to_string()]))
            .unwrap();
        assert_eq!(text, r#"{"type":"subscribe","symbols":["SBER"]}"#);
    }
}
