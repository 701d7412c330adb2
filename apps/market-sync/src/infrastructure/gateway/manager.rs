//! Gateway Connection Manager
//!
//! Owns the single streaming connection to the market gateway, the
//! subscription set and the reconnect state machine, and fans decoded
//! events out to observers.
//!
//! # State Machine
//!
//! ```text
//!                connect()                open ok
//! Disconnected ───────────► Connecting ───────────► Connected
//!      ▲                        │                      │
//!      │ disconnect()           │ open failed          │ connection lost
//!      │                        ▼                      ▼
//!      └─────────────────── Reconnecting ◄─────────────┘
//!                               │ retries spent
//!                               ▼
//!                        FailedPermanently
//! ```
//!
//! Every `connect()`/`disconnect()` starts a new generation. Open results,
//! closures and timers belonging to an older generation are discarded.

use std::sync::Arc;
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::codec::GatewayCodec;
use super::messages::{ClientMessage, GatewayMessage};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::{Transport, TransportConnection, TransportError};
use crate::application::services::{AlertGate, Disposer, ObserverList, PriceStore};
use crate::domain::connection::ConnectionState;
use crate::domain::streaming::{GatewayError, PriceBatch, Recommendation, RiskAlert};
use crate::domain::subscription::{SubscriptionSet, Symbol};
use crate::infrastructure::metrics;

// =============================================================================
// Internal State
// =============================================================================

/// A live connection: outbound queue and cancellation for its task.
struct Session {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    cancel: CancellationToken,
}

struct Shared {
    state: ConnectionState,
    epoch: u64,
    policy: ReconnectPolicy,
    session: Option<Session>,
    reconnect_timer: Option<CancellationToken>,
    subscriptions: SubscriptionSet,
}

impl Shared {
    /// Move to `next`, returning it if the state actually changed.
    fn transition(&mut self, next: ConnectionState) -> Option<ConnectionState> {
        if self.state == next {
            None
        } else {
            self.state = next;
            Some(next)
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.cancel();
        }
    }

    fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
        }
    }

    /// Queue a message on the live session when connected.
    fn send(&self, message: ClientMessage) {
        if self.state != ConnectionState::Connected {
            return;
        }
        if let Some(session) = &self.session
            && session.outbound.send(message).is_err()
        {
            tracing::debug!("Session closed before outbound message was queued");
        }
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    codec: GatewayCodec,
    /// Held from a state transition until its observers have run, so
    /// observers see transitions in the order they happened. Reentrant for
    /// observers that call back into the manager.
    state_order: ReentrantMutex<()>,
    shared: Mutex<Shared>,
    prices: ObserverList<PriceBatch>,
    risk_alerts: ObserverList<RiskAlert>,
    recommendations: ObserverList<Recommendation>,
    state_changes: ObserverList<ConnectionState>,
    gateway_errors: ObserverList<GatewayError>,
}

// =============================================================================
// Connection Manager
// =============================================================================

/// Handle to the gateway connection.
///
/// Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a disconnected manager.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, reconnect: ReconnectConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                codec: GatewayCodec::new(),
                state_order: ReentrantMutex::new(()),
                shared: Mutex::new(Shared {
                    state: ConnectionState::Disconnected,
                    epoch: 0,
                    policy: ReconnectPolicy::new(reconnect),
                    session: None,
                    reconnect_timer: None,
                    subscriptions: SubscriptionSet::new(),
                }),
                prices: ObserverList::new(),
                risk_alerts: ObserverList::new(),
                recommendations: ObserverList::new(),
                state_changes: ObserverList::new(),
                gateway_errors: ObserverList::new(),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Open the gateway connection.
    ///
    /// Returns once the first open attempt has completed. A failed open is
    /// not reported here; it moves the manager into reconnection.
    pub async fn connect(&self) {
        let epoch = {
            let _ordered = self.inner.state_order.lock();
            let (epoch, changed) = {
                let mut shared = self.inner.shared.lock();
                if matches!(
                    shared.state,
                    ConnectionState::Connected | ConnectionState::Connecting
                ) {
                    tracing::debug!(state = %shared.state, "Connect ignored");
                    return;
                }
                shared.epoch += 1;
                shared.cancel_timer();
                shared.policy.reset();
                let changed = shared.transition(ConnectionState::Connecting);
                (shared.epoch, changed)
            };
            self.inner.publish(changed);
            epoch
        };

        let inner = Arc::clone(&self.inner);
        if let Err(e) = tokio::spawn(async move { inner.open_session(epoch).await }).await {
            tracing::error!(error = %e, "Gateway open task failed");
        }
    }

    /// Close the connection and stop reconnecting.
    pub fn disconnect(&self) {
        let _ordered = self.inner.state_order.lock();
        let changed = {
            let mut shared = self.inner.shared.lock();
            shared.epoch += 1;
            shared.cancel_timer();
            shared.close_session();
            shared.policy.reset();
            shared.transition(ConnectionState::Disconnected)
        };
        if changed.is_some() {
            tracing::info!(endpoint = self.inner.transport.endpoint(), "Disconnected from market gateway");
        }
        self.inner.publish(changed);
    }

    // -------------------------------------------------------------------------
    // Subscriptions
    // -------------------------------------------------------------------------

    /// Add symbols; the newly added ones are sent upstream when connected.
    pub fn subscribe<I, S>(&self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        let (added, total) = {
            let mut shared = self.inner.shared.lock();
            let added = shared.subscriptions.add(symbols);
            if !added.is_empty() {
                shared.send(ClientMessage::subscribe(added.clone()));
            }
            (added, shared.subscriptions.len())
        };
        if !added.is_empty() {
            tracing::debug!(symbols = ?added, "Subscribed");
        }
        metrics::set_subscribed_symbols(total);
    }

    /// Remove symbols; the removed ones are sent upstream when connected.
    pub fn unsubscribe<I, S>(&self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        let (removed, total) = {
            let mut shared = self.inner.shared.lock();
            let removed = shared.subscriptions.remove(symbols);
            if !removed.is_empty() {
                shared.send(ClientMessage::unsubscribe(removed.clone()));
            }
            (removed, shared.subscriptions.len())
        };
        if !removed.is_empty() {
            tracing::debug!(symbols = ?removed, "Unsubscribed");
        }
        metrics::set_subscribed_symbols(total);
    }

    /// Remove every symbol.
    pub fn unsubscribe_all(&self) {
        {
            let mut shared = self.inner.shared.lock();
            let removed = shared.subscriptions.clear();
            if !removed.is_empty() {
                shared.send(ClientMessage::unsubscribe(removed));
            }
        }
        metrics::set_subscribed_symbols(0);
    }

    // -------------------------------------------------------------------------
    // Observers
    // -------------------------------------------------------------------------

    /// Observe price batches.
    pub fn on_price_update<F>(&self, callback: F) -> Disposer
    where
        F: Fn(&PriceBatch) + Send + Sync + 'static,
    {
        self.inner.prices.register(callback)
    }

    /// Observe risk alerts.
    pub fn on_risk_alert<F>(&self, callback: F) -> Disposer
    where
        F: Fn(&RiskAlert) + Send + Sync + 'static,
    {
        self.inner.risk_alerts.register(callback)
    }

    /// Observe recommendations.
    pub fn on_recommendation<F>(&self, callback: F) -> Disposer
    where
        F: Fn(&Recommendation) + Send + Sync + 'static,
    {
        self.inner.recommendations.register(callback)
    }

    /// Observe connection state changes.
    pub fn on_connection_change<F>(&self, callback: F) -> Disposer
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        self.inner.state_changes.register(callback)
    }

    /// Observe gateway `error` frames.
    pub fn on_gateway_error<F>(&self, callback: F) -> Disposer
    where
        F: Fn(&GatewayError) + Send + Sync + 'static,
    {
        self.inner.gateway_errors.register(callback)
    }

    // -------------------------------------------------------------------------
    // Consumers
    // -------------------------------------------------------------------------

    /// Feed price batches into a store.
    pub fn attach_price_store(&self, store: &Arc<PriceStore>) -> Disposer {
        let store = Arc::clone(store);
        self.on_price_update(move |batch| {
            store.apply_batch(batch);
            metrics::record_ticks_applied(batch.len(), store.len());
        })
    }

    /// Route risk alerts and recommendations through an alert gate.
    pub fn attach_alert_gate(&self, gate: &Arc<AlertGate>) -> Vec<Disposer> {
        let alerts = Arc::clone(gate);
        let risk = self.on_risk_alert(move |alert| {
            metrics::record_alert(alerts.notify_risk_alert(alert));
        });

        let recommendations = Arc::clone(gate);
        let recommendation = self.on_recommendation(move |rec| {
            metrics::record_alert(recommendations.notify_recommendation(rec));
        });

        vec![risk, recommendation]
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    /// Whether the connection is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Subscribed symbols, sorted.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<Symbol> {
        self.inner.shared.lock().subscriptions.to_vec()
    }

    /// Reconnect attempts made since the last successful open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.shared.lock().policy.attempt_count()
    }

    /// Gateway endpoint description.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.inner.transport.endpoint()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.transport.endpoint())
            .field("state", &shared.state)
            .field("subscriptions", &shared.subscriptions.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Session Handling
// =============================================================================

impl Inner {
    fn publish(&self, changed: Option<ConnectionState>) {
        if let Some(state) = changed {
            tracing::info!(state = %state, "Gateway connection state changed");
            metrics::set_connection_state(state);
            self.state_changes.dispatch(&state);
        }
    }

    async fn open_session(self: &Arc<Self>, epoch: u64) {
        match self.transport.open().await {
            Ok(connection) => self.on_open(epoch, connection),
            Err(e) => {
                tracing::warn!(error = %e, endpoint = self.transport.endpoint(), "Gateway open failed");
                self.on_connection_lost(epoch);
            }
        }
    }

    fn on_open(self: &Arc<Self>, epoch: u64, connection: TransportConnection) {
        let ordered = self.state_order.lock();
        let (outbound_rx, cancel, changed, replayed) = {
            let mut shared = self.shared.lock();
            if shared.epoch != epoch {
                tracing::debug!("Discarding connection from a superseded connect");
                return;
            }

            shared.policy.reset();
            let (outbound, outbound_rx) = mpsc::unbounded_channel();
            let symbols = shared.subscriptions.to_vec();
            let replayed = symbols.len();
            if !symbols.is_empty() {
                // Receiver is alive until the session task ends.
                let _ = outbound.send(ClientMessage::subscribe(symbols));
            }

            let cancel = CancellationToken::new();
            shared.session = Some(Session {
                outbound,
                cancel: cancel.clone(),
            });
            let changed = shared.transition(ConnectionState::Connected);
            (outbound_rx, cancel, changed, replayed)
        };

        tracing::info!(
            endpoint = self.transport.endpoint(),
            replayed,
            "Connected to market gateway"
        );
        self.publish(changed);
        drop(ordered);

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.run_session(epoch, connection, outbound_rx, cancel).await;
        });
    }

    async fn run_session(
        self: Arc<Self>,
        epoch: u64,
        connection: TransportConnection,
        mut outbound: mpsc::UnboundedReceiver<ClientMessage>,
        cancel: CancellationToken,
    ) {
        let TransportConnection {
            mut sink,
            mut stream,
        } = connection;

        let reason = loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    if let Err(e) = sink.close().await {
                        tracing::debug!(error = %e, "Error closing gateway connection");
                    }
                    return;
                }
                Some(message) = outbound.recv() => {
                    match self.codec.encode(&message) {
                        Ok(text) => {
                            if let Err(e) = sink.send(text).await {
                                break e;
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "Failed to encode client message"),
                    }
                }
                frame = stream.next() => {
                    match frame {
                        Some(Ok(text)) => self.handle_frame(&text),
                        Some(Err(e)) => break e,
                        None => break TransportError::Closed,
                    }
                }
            }
        };

        tracing::warn!(error = %reason, "Gateway connection lost");
        self.on_connection_lost(epoch);
    }

    fn handle_frame(&self, text: &str) {
        let started = Instant::now();
        let messages = match self.codec.decode(text) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed gateway frame");
                metrics::record_decode_error();
                return;
            }
        };

        for message in messages {
            metrics::record_frame_received(message.kind());
            match message {
                GatewayMessage::Prices(batch) => self.prices.dispatch(&batch),
                GatewayMessage::RiskAlert(alert) => self.risk_alerts.dispatch(&alert),
                GatewayMessage::Recommendation(rec) => self.recommendations.dispatch(&rec),
                GatewayMessage::Subscribed(symbols) => {
                    tracing::debug!(?symbols, "Gateway acknowledged subscription");
                }
                GatewayMessage::Error(error) => {
                    tracing::warn!(code = ?error.code, message = %error.message, "Gateway reported an error");
                    metrics::record_gateway_error();
                    self.gateway_errors.dispatch(&error);
                }
            }
        }
        metrics::record_frame_processing(started.elapsed());
    }

    fn on_connection_lost(self: &Arc<Self>, epoch: u64) {
        let _ordered = self.state_order.lock();
        let (changed, retry) = {
            let mut shared = self.shared.lock();
            if shared.epoch != epoch {
                return;
            }
            shared.close_session();

            if let Some(delay) = shared.policy.next_delay() {
                let timer = CancellationToken::new();
                shared.reconnect_timer = Some(timer.clone());
                let attempt = shared.policy.attempt_count();
                let changed = shared.transition(ConnectionState::Reconnecting);
                (changed, Some((delay, attempt, timer)))
            } else {
                (shared.transition(ConnectionState::FailedPermanently), None)
            }
        };

        if let Some((delay, attempt, timer)) = retry {
            tracing::info!(
                attempt,
                delay_ms = delay.as_millis(),
                "Reconnecting to market gateway"
            );
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                tokio::select! {
                    () = timer.cancelled() => {}
                    () = tokio::time::sleep(delay) => inner.retry(epoch).await,
                }
            });
        } else {
            tracing::error!(
                endpoint = self.transport.endpoint(),
                "Reconnect attempts exhausted, giving up"
            );
        }

        self.publish(changed);
    }

    async fn retry(self: &Arc<Self>, epoch: u64) {
        {
            let mut shared = self.shared.lock();
            if shared.epoch != epoch || shared.state != ConnectionState::Reconnecting {
                return;
            }
            shared.reconnect_timer = None;
        }
        metrics::record_reconnect();
        self.open_session(epoch).await;
    }
}

// =============================================================================
// Tests
// =============================================================================
