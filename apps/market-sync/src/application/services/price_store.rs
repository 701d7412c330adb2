//! Price State Aggregator
//!
//! Single source of truth for "current price" reads. Holds the latest tick
//! per symbol and the timestamp of the last applied batch.
//!
//! # Consistency
//!
//! The snapshot is copy-on-write: a batch is applied to a private copy (or
//! in place when no reader holds the current view) and published in one
//! step, so readers observe either the pre- or the post-batch map.
//!
//! Arrival order is trusted. Batches reordered by the transport are not
//! detected, so an older tick arriving later wins.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::domain::streaming::{PriceBatch, PriceTick};
use crate::domain::subscription::Symbol;

/// Map from symbol to its latest tick.
pub type PriceSnapshot = HashMap<Symbol, PriceTick>;

#[derive(Debug, Default)]
struct StoreState {
    snapshot: Arc<PriceSnapshot>,
    last_update: Option<DateTime<Utc>>,
}

/// Latest-tick store fed by price batches.
///
/// # Example
///
/// ```rust
/// use chrono::Utc;
/// use market_sync::application::services::PriceStore;
/// use market_sync::domain::streaming::{PriceBatch, PriceTick};
/// use rust_decimal::Decimal;
///
/// let store = PriceStore::new();
/// let tick = PriceTick::new("SBER", Decimal::from(100), Decimal::ZERO, Decimal::ZERO, Utc::now());
/// store.apply_batch(&PriceBatch::single(tick));
///
/// assert_eq!(store.read("SBER").unwrap().price, Decimal::from(100));
/// assert!(store.read("GAZP").is_none());
/// ```
#[derive(Debug)]
pub struct PriceStore {
    state: RwLock<StoreState>,
    updates: watch::Sender<Option<DateTime<Utc>>>,
}

impl Default for PriceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (updates, _) = watch::channel(None);
        Self {
            state: RwLock::new(StoreState::default()),
            updates,
        }
    }

    /// Upsert every tick of the batch; within the batch the last tick for a
    /// symbol wins. Records the batch timestamp as the last update.
    pub fn apply_batch(&self, batch: &PriceBatch) {
        let (symbols, timestamp) = {
            let mut state = self.state.write();
            let snapshot = Arc::make_mut(&mut state.snapshot);
            for tick in &batch.ticks {
                snapshot.insert(tick.symbol.clone(), tick.clone());
            }
            let symbols = snapshot.len();
            state.last_update = Some(batch.timestamp);
            (symbols, batch.timestamp)
        };

        self.updates.send_replace(Some(timestamp));

        tracing::trace!(
            ticks = batch.ticks.len(),
            symbols,
            timestamp = %timestamp,
            "Price batch applied"
        );
    }

    /// Current tick for a symbol.
    #[must_use]
    pub fn read(&self, symbol: &str) -> Option<PriceTick> {
        self.state.read().snapshot.get(symbol).cloned()
    }

    /// Read-only view of the whole snapshot.
    ///
    /// The view never changes; later batches produce a new one.
    #[must_use]
    pub fn read_all(&self) -> Arc<PriceSnapshot> {
        Arc::clone(&self.state.read().snapshot)
    }

    /// Whole snapshot together with the timestamp of the batch that
    /// produced it, read under one guard.
    #[must_use]
    pub fn snapshot(&self) -> (Arc<PriceSnapshot>, Option<DateTime<Utc>>) {
        let state = self.state.read();
        (Arc::clone(&state.snapshot), state.last_update)
    }

    /// Timestamp of the last applied batch.
    #[must_use]
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_update
    }

    /// Receiver that changes whenever a batch is applied.
    #[must_use]
    pub fn watch_updates(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.updates.subscribe()
    }

    /// Number of symbols with a tick.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().snapshot.len()
    }

    /// Whether no tick has been stored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().snapshot.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
