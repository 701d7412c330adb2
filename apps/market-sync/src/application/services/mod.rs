//! Application Services
//!
//! Services that consume connection-manager events and hold derived state.
//!
//! - `PriceStore`: Latest tick per symbol
//! - `AlertGate`: Cooldown-based alert deduplication
//! - `ObserverList`: Ordered callback lists with disposers

pub mod alert_gate;
pub mod observers;
pub mod price_store;

pub use alert_gate::{
    AlertGate, AlertGateConfig, AlertPriority, DEFAULT_COOLDOWN, DEFAULT_RETENTION, NotifyOutcome,
};
pub use observers::{Disposer, ObserverList};
pub use price_store::{PriceSnapshot, PriceStore};
