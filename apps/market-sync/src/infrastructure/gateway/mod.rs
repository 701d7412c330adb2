//! Market Gateway Adapters
//!
//! Client side of the market gateway stream:
//!
//! - **Codec**: JSON envelopes in, subscribe/unsubscribe requests out
//! - **Transport**: `tokio-tungstenite` WebSocket connection
//! - **Manager**: connection lifecycle, subscriptions, reconnect policy and
//!   observer fan-out

pub mod codec;
pub mod manager;
pub mod messages;
pub mod reconnect;
pub mod websocket;

pub use codec::{CodecError, GatewayCodec};
pub use manager::ConnectionManager;
pub use messages::{ClientMessage, GatewayMessage};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use websocket::WebSocketTransport;
