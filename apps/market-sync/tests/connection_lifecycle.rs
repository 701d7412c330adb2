//! Connection Lifecycle Integration Tests
//!
//! Drives the connection manager against an in-memory gateway: replay on
//! reconnect, retry exhaustion, subscription deltas and event fan-out.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc as wire;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::timeout;

use market_sync::{
    AlertGate, AlertGateConfig, ConnectionManager, ConnectionState, DisplayError, DisplayOptions,
    GatewayError, NotificationDisplay, PriceBatch, PriceStore, ReconnectConfig, Recommendation,
    Transport, TransportConnection, TransportError,
};

// =============================================================================
// In-memory gateway
// =============================================================================

/// Server side of one accepted connection.
struct GatewayHandle {
    from_client: wire::UnboundedReceiver<String>,
    to_client: wire::UnboundedSender<Result<String, TransportError>>,
}

impl GatewayHandle {
    fn push(&self, frame: Value) {
        self.to_client.unbounded_send(Ok(frame.to_string())).unwrap();
    }

    fn push_raw(&self, frame: &str) {
        self.to_client.unbounded_send(Ok(frame.to_string())).unwrap();
    }

    async fn next_request(&mut self) -> Value {
        let text = timeout(Duration::from_secs(5), self.from_client.next())
            .await
            .expect("client request")
            .expect("client connection open");
        serde_json::from_str(&text).unwrap()
    }

    async fn assert_no_request(&mut self) {
        let pending = timeout(Duration::from_millis(50), self.from_client.next()).await;
        assert!(pending.is_err(), "unexpected request: {pending:?}");
    }
}

struct FakeTransport {
    accept: AtomicBool,
    opens: AtomicUsize,
    accepted: mpsc::UnboundedSender<GatewayHandle>,
}

impl FakeTransport {
    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(&self) -> Result<TransportConnection, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.accept.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectFailed("refused".to_string()));
        }

        let (client_tx, from_client) = wire::unbounded();
        let (to_client, client_rx) = wire::unbounded();
        let _ = self.accepted.send(GatewayHandle {
            from_client,
            to_client,
        });

        Ok(TransportConnection::new(
            client_tx.sink_map_err(|_| TransportError::Closed),
            client_rx,
        ))
    }

    fn endpoint(&self) -> &str {
        "memory://gateway"
    }
}

struct Harness {
    manager: ConnectionManager,
    transport: Arc<FakeTransport>,
    accepted: mpsc::UnboundedReceiver<GatewayHandle>,
}

impl Harness {
    fn new(accept: bool) -> Self {
        let (tx, accepted) = mpsc::unbounded_channel();
        let transport = Arc::new(FakeTransport {
            accept: AtomicBool::new(accept),
            opens: AtomicUsize::new(0),
            accepted: tx,
        });
        let manager = ConnectionManager::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            ReconnectConfig::new(Duration::from_millis(100), 0.0, 5),
        );
        Self {
            manager,
            transport,
            accepted,
        }
    }

    async fn next_connection(&mut self) -> GatewayHandle {
        timeout(Duration::from_secs(30), self.accepted.recv())
            .await
            .expect("gateway connection")
            .expect("transport alive")
    }
}

fn collect<T: Clone + Send + 'static>() -> (
    impl Fn(&T) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<T>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |event: &T| {
            let _ = tx.send(event.clone());
        },
        rx,
    )
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event delivered")
        .expect("observer alive")
}

fn price_update(symbol: &str, price: i64) -> Value {
    json!({
        "type": "price_update",
        "data": {
            "symbol": symbol,
            "currentPrice": price,
            "change": 5,
            "changePercent": 5,
            "timestamp": "2024-03-15T10:00:01Z"
        }
    })
}

// =============================================================================
// Reconnection
// =============================================================================

#[tokio::test(start_paused = true)]
async fn reconnect_replays_subscriptions_exactly_once() {
    let mut harness = Harness::new(true);
    harness.manager.subscribe(["SBER", "GAZP"]);

    harness.manager.connect().await;
    let mut first = harness.next_connection().await;
    assert_eq!(
        first.next_request().await,
        json!({"type": "subscribe", "symbols": ["GAZP", "SBER"]})
    );

    drop(first);
    let mut second = harness.next_connection().await;

    assert_eq!(
        second.next_request().await,
        json!({"type": "subscribe", "symbols": ["GAZP", "SBER"]})
    );
    second.assert_no_request().await;
    assert_eq!(harness.manager.state(), ConnectionState::Connected);
    assert_eq!(harness.manager.reconnect_attempts(), 0);

    harness.manager.disconnect();
    let closed = timeout(Duration::from_secs(5), second.from_client.next())
        .await
        .expect("sink closed on disconnect");
    assert!(closed.is_none());
    assert_eq!(harness.manager.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn dropped_connection_retries_after_base_delay() {
    let mut harness = Harness::new(true);
    let (observer, mut states) = collect::<ConnectionState>();
    let _states = harness.manager.on_connection_change(observer);

    harness.manager.connect().await;
    let first = harness.next_connection().await;
    drop(first);

    assert_eq!(recv(&mut states).await, ConnectionState::Connecting);
    assert_eq!(recv(&mut states).await, ConnectionState::Connected);
    assert_eq!(recv(&mut states).await, ConnectionState::Reconnecting);

    tokio::time::sleep(Duration::from_millis(99)).await;
    assert_eq!(harness.transport.opens(), 1);
    assert_eq!(harness.manager.state(), ConnectionState::Reconnecting);

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(harness.transport.opens(), 2);
    assert_eq!(recv(&mut states).await, ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_five_reconnect_attempts() {
    let harness = Harness::new(false);

    harness.manager.connect().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    // Initial open plus five reconnect attempts.
    assert_eq!(harness.transport.opens(), 6);
    assert_eq!(
        harness.manager.state(),
        ConnectionState::FailedPermanently
    );

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.transport.opens(), 6);
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_retry() {
    let harness = Harness::new(false);

    harness.manager.connect().await;
    assert_eq!(harness.manager.state(), ConnectionState::Reconnecting);

    harness.manager.disconnect();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(harness.transport.opens(), 1);
    assert_eq!(harness.manager.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn connect_while_connected_is_a_no_op() {
    let mut harness = Harness::new(true);

    harness.manager.connect().await;
    let _gateway = harness.next_connection().await;
    harness.manager.connect().await;

    assert_eq!(harness.transport.opens(), 1);
    assert!(harness.manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn recovers_once_gateway_accepts_again() {
    let mut harness = Harness::new(false);

    harness.manager.connect().await;
    assert_eq!(harness.manager.state(), ConnectionState::Reconnecting);

    harness.transport.accept.store(true, Ordering::SeqCst);
    let _gateway = harness.next_connection().await;

    assert_eq!(harness.transport.opens(), 2);
    assert_eq!(harness.manager.state(), ConnectionState::Connected);
    assert_eq!(harness.manager.reconnect_attempts(), 0);
}

// =============================================================================
// Subscriptions
// =============================================================================

#[tokio::test(start_paused = true)]
async fn subscription_changes_send_only_the_delta() {
    let mut harness = Harness::new(true);
    harness.manager.subscribe(["SBER"]);

    harness.manager.connect().await;
    let mut gateway = harness.next_connection().await;
    assert_eq!(
        gateway.next_request().await,
        json!({"type": "subscribe", "symbols": ["SBER"]})
    );

    harness.manager.subscribe(["SBER", "GAZP"]);
    assert_eq!(
        gateway.next_request().await,
        json!({"type": "subscribe", "symbols": ["GAZP"]})
    );

    harness.manager.unsubscribe(["SBER", "LKOH"]);
    assert_eq!(
        gateway.next_request().await,
        json!({"type": "unsubscribe", "symbols": ["SBER"]})
    );

    harness.manager.unsubscribe(["LKOH"]);
    harness.manager.subscribe(["GAZP"]);
    gateway.assert_no_request().await;

    assert_eq!(harness.manager.subscriptions(), vec!["GAZP"]);
}

#[tokio::test(start_paused = true)]
async fn empty_subscription_set_sends_nothing_on_connect() {
    let mut harness = Harness::new(true);

    harness.manager.connect().await;
    let mut gateway = harness.next_connection().await;

    gateway.assert_no_request().await;
}

// =============================================================================
// Event Fan-out
// =============================================================================

#[tokio::test(start_paused = true)]
async fn price_update_arrives_as_single_tick_batch() {
    let mut harness = Harness::new(true);
    let (observer, mut batches) = collect::<PriceBatch>();
    let _prices = harness.manager.on_price_update(observer);

    harness.manager.connect().await;
    let gateway = harness.next_connection().await;
    gateway.push(price_update("SBER", 105));

    let batch = recv(&mut batches).await;
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.ticks[0].symbol, "SBER");
    assert_eq!(batch.ticks[0].price, Decimal::from(105));
}

#[tokio::test(start_paused = true)]
async fn malformed_frame_is_dropped_and_stream_continues() {
    let mut harness = Harness::new(true);
    let (observer, mut batches) = collect::<PriceBatch>();
    let _prices = harness.manager.on_price_update(observer);

    harness.manager.connect().await;
    let gateway = harness.next_connection().await;
    gateway.push_raw("{not json");
    gateway.push_raw(r#"{"type":"heartbeat","data":{}}"#);
    gateway.push(price_update("GAZP", 170));

    let batch = recv(&mut batches).await;
    assert_eq!(batch.ticks[0].symbol, "GAZP");
    assert!(batches.try_recv().is_err());
    assert_eq!(harness.manager.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn disposed_observer_stops_receiving() {
    let mut harness = Harness::new(true);
    let (observer, mut disposed_rx) = collect::<PriceBatch>();
    let disposer = harness.manager.on_price_update(observer);
    let (sentinel, mut sentinel_rx) = collect::<PriceBatch>();
    let _sentinel = harness.manager.on_price_update(sentinel);

    harness.manager.connect().await;
    let gateway = harness.next_connection().await;

    gateway.push(price_update("SBER", 100));
    recv(&mut disposed_rx).await;
    recv(&mut sentinel_rx).await;

    disposer.dispose();
    gateway.push(price_update("SBER", 101));
    recv(&mut sentinel_rx).await;

    assert!(disposed_rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn gateway_error_reaches_observers_without_state_change() {
    let mut harness = Harness::new(true);
    let (observer, mut errors) = collect::<GatewayError>();
    let _errors = harness.manager.on_gateway_error(observer);

    harness.manager.connect().await;
    let gateway = harness.next_connection().await;
    gateway.push(json!({
        "type": "error",
        "data": {"code": 404, "message": "unknown symbol XXXX"}
    }));

    let error = recv(&mut errors).await;
    assert_eq!(error.code, Some(404));
    assert_eq!(error.message, "unknown symbol XXXX");
    assert_eq!(harness.manager.state(), ConnectionState::Connected);
}

// =============================================================================
// Price Store and Alert Gate
// =============================================================================

#[derive(Default)]
struct RecordingDisplay {
    shown: Mutex<Vec<(String, String, DisplayOptions)>>,
}

impl NotificationDisplay for RecordingDisplay {
    fn can_display(&self) -> bool {
        true
    }

    fn display(
        &self,
        title: &str,
        body: &str,
        options: &DisplayOptions,
    ) -> Result<(), DisplayError> {
        self.shown
            .lock()
            .push((title.to_string(), body.to_string(), options.clone()));
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn gateway_events_feed_store_and_alert_gate() {
    let mut harness = Harness::new(true);
    let store = Arc::new(PriceStore::new());
    let _store = harness.manager.attach_price_store(&store);
    let display = Arc::new(RecordingDisplay::default());
    let gate = Arc::new(AlertGate::new(
        AlertGateConfig::default(),
        Arc::clone(&display) as Arc<dyn NotificationDisplay>,
    ));
    let _gate = harness.manager.attach_alert_gate(&gate);
    let (sentinel, mut done) = collect::<Recommendation>();
    let _sentinel = harness.manager.on_recommendation(sentinel);

    harness.manager.connect().await;
    let gateway = harness.next_connection().await;
    gateway.push(json!([
        {"type": "price_batch", "data": {"timestamp": "2024-03-15T10:00:00Z", "prices": [
            {"symbol": "SBER", "price": 100, "change": 0, "changePercent": 0},
            {"symbol": "GAZP", "price": 170, "change": 1, "changePercent": 0.5},
            {"symbol": "SBER", "price": 101, "change": 1, "changePercent": 1}
        ]}},
        {"type": "risk_alert", "data": {"type": "concentration", "message": "SBER is 40% of portfolio"}},
        {"type": "risk_alert", "data": {"type": "concentration", "message": "SBER is 40% of portfolio"}},
        {"type": "recommendation", "data": {"symbol": "GAZP", "recommendation": "buy", "confidence": 0.85}}
    ]));
    recv(&mut done).await;

    assert_eq!(store.len(), 2);
    assert_eq!(store.read("SBER").unwrap().price, Decimal::from(101));
    assert_eq!(store.read("GAZP").unwrap().price, Decimal::from(170));
    assert!(store.last_update().is_some());

    let shown = display.shown.lock().clone();
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[0].0, "Risk Alert: concentration");
    assert_eq!(shown[0].1, "SBER is 40% of portfolio");
    assert!(shown[0].2.require_interaction);
    assert_eq!(shown[1].0, "GAZP: BUY");
    assert_eq!(shown[1].1, "Confidence: 85%");
    assert!(!shown[1].2.require_interaction);
    assert_eq!(gate.tracked_keys(), 2);
}

#[tokio::test(start_paused = true)]
async fn explicit_reconnect_sends_one_subscribe() {
    let mut harness = Harness::new(true);
    harness.manager.subscribe(["SBER"]);

    harness.manager.connect().await;
    let mut first = harness.next_connection().await;
    first.next_request().await;

    harness.manager.disconnect();
    harness.manager.connect().await;
    let mut second = harness.next_connection().await;

    assert_eq!(
        second.next_request().await,
        json!({"type": "subscribe", "symbols": ["SBER"]})
    );
    second.assert_no_request().await;
    assert_eq!(harness.transport.opens(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_state_event_matches_state_under_concurrent_loss_and_disconnect() {
    for _ in 0..50 {
        let mut harness = Harness::new(true);
        let (observer, mut states) = collect::<ConnectionState>();
        let _states = harness.manager.on_connection_change(observer);

        harness.manager.connect().await;
        let gateway = harness.next_connection().await;

        let manager = harness.manager.clone();
        let loss = tokio::spawn(async move { drop(gateway) });
        let stop = tokio::spawn(async move { manager.disconnect() });
        loss.await.unwrap();
        stop.await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut last = None;
        while let Ok(state) = states.try_recv() {
            last = Some(state);
        }
        assert_eq!(harness.manager.state(), ConnectionState::Disconnected);
        assert_eq!(last, Some(ConnectionState::Disconnected));
    }
}
