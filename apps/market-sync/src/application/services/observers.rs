//! Observer Registry
//!
//! Ordered callback lists with disposers. Each dispatch iterates a snapshot
//! of the list taken under the lock, so callbacks may register or dispose
//! observers (including themselves) while a dispatch is in flight.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

/// Ordered list of observers for one event kind.
pub struct ObserverList<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T: 'static> Default for ObserverList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> ObserverList<T> {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Append an observer.
    ///
    /// The returned disposer removes exactly this observer.
    pub fn register<F>(&self, callback: F) -> Disposer
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.entries.push((id, Arc::new(callback)));
            id
        };

        let registry: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.registry);
        Disposer::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.lock().entries.retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Invoke every observer registered at the time of the call, in
    /// registration order.
    pub fn dispatch(&self, event: &T) {
        let snapshot: Vec<Callback<T>> = self
            .registry
            .lock()
            .entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in snapshot {
            callback(event);
        }
    }

    /// Number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }

    /// Whether no observer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.lock().entries.is_empty()
    }
}

impl<T> fmt::Debug for ObserverList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("observers", &self.registry.lock().entries.len())
            .finish()
    }
}

// =============================================================================
// Disposer
// =============================================================================

/// Removes one registered observer.
///
/// Dropping a disposer without calling [`Disposer::dispose`] leaves the
/// observer registered.
pub struct Disposer {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Disposer {
    fn new(remove: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// Remove the observer. Future dispatches no longer reach it; a dispatch
    /// already in progress may still invoke it once.
    pub fn dispose(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("armed", &self.remove.is_some())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
