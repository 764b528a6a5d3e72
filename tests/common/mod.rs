#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use tokio::sync::Notify;

use pennywatch::{
    error::{SendError, StoreError},
    models::{Alert, AlertEvent, AlertKind, EventUpdate, TickerSnapshot},
    services::{notifications::{NotificationSender, OutboundMessage}, AlertEngine, EngineConfig},
    stores::{memory::MemoryStore, AlertCandidate, AlertStore, EventPage, EventQuery, NotificationStore},
};

/// 2024-02-15T10:30:00Z, the first millisecond of its 5 minute bucket.
pub const T_1030: i64 = 1_707_993_000_000;
pub const MINUTE: i64 = 60_000;

/// Records every message and fails the first N sends with scripted errors.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<OutboundMessage>>,
    failures: Mutex<VecDeque<String>>,
    attempts: AtomicUsize,
}

impl RecordingSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_with(errors: &[&str]) -> Arc<Self> {
        let s = Self::default();
        s.failures.lock().unwrap().extend(errors.iter().map(|e| e.to_string()));
        Arc::new(s)
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(SendError::Transport(err));
        }

        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Blocks every send until `open` is notified.
#[derive(Default)]
pub struct GatedSender {
    pub open: Notify,
    pub calls: AtomicUsize,
}

#[async_trait]
impl NotificationSender for GatedSender {
    async fn send(&self, _message: &OutboundMessage) -> Result<(), SendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.open.notified().await;
        Ok(())
    }
}

/// Panics on its first send, then records like `RecordingSender`.
#[derive(Default)]
pub struct PanicOnceSender {
    calls: AtomicUsize,
    pub inner: RecordingSender,
}

#[async_trait]
impl NotificationSender for PanicOnceSender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("first send explodes");
        }
        self.inner.send(message).await
    }
}

/// What goes wrong in a `FaultyStore`, always for a single alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    CreateEventFails,
    CreateEventPanics,
    MarkSentFails,
    LastTriggeredFails,
}

/// Delegates to a `MemoryStore` but injects `fault` for one alert id.
pub struct FaultyStore {
    pub inner: Arc<MemoryStore>,
    pub broken: ObjectId,
    pub fault: Fault,
}

impl FaultyStore {
    pub fn new(inner: &Arc<MemoryStore>, broken: ObjectId, fault: Fault) -> Arc<Self> {
        Arc::new(Self { inner: inner.clone(), broken, fault })
    }

    fn backend_down() -> StoreError {
        StoreError::Backend("write concern timeout".to_string())
    }
}

#[async_trait]
impl AlertStore for FaultyStore {
    async fn list_active_alerts_with_tickers(&self) -> Result<Vec<AlertCandidate>, StoreError> {
        self.inner.list_active_alerts_with_tickers().await
    }

    async fn update_last_triggered(&self, alert_id: ObjectId, at: i64) -> Result<(), StoreError> {
        if alert_id == self.broken && self.fault == Fault::LastTriggeredFails {
            return Err(Self::backend_down());
        }
        self.inner.update_last_triggered(alert_id, at).await
    }
}

#[async_trait]
impl NotificationStore for FaultyStore {
    async fn create_event(
        &self,
        alert_id: ObjectId,
        triggered_at: i64,
        time_bucket: i64,
        measured_value: f64,
    ) -> Result<AlertEvent, StoreError> {
        if alert_id == self.broken {
            match self.fault {
                Fault::CreateEventFails => return Err(Self::backend_down()),
                Fault::CreateEventPanics => panic!("event insert blew up"),
                _ => {}
            }
        }
        self.inner.create_event(alert_id, triggered_at, time_bucket, measured_value).await
    }

    async fn find_event(&self, alert_id: ObjectId, time_bucket: i64) -> Result<Option<AlertEvent>, StoreError> {
        self.inner.find_event(alert_id, time_bucket).await
    }

    async fn update_event_status(&self, event_id: ObjectId, update: EventUpdate) -> Result<(), StoreError> {
        if self.fault == Fault::MarkSentFails && matches!(update, EventUpdate::Sent { .. }) {
            let owned_by_broken = self.inner.events_for(self.broken).await.iter().any(|e| e.id == event_id);
            if owned_by_broken {
                return Err(Self::backend_down());
            }
        }
        self.inner.update_event_status(event_id, update).await
    }

    async fn list_events(&self, query: &EventQuery) -> Result<EventPage, StoreError> {
        self.inner.list_events(query).await
    }
}

/// Alert store that panics while loading.
pub struct PanickingAlertStore;

#[async_trait]
impl AlertStore for PanickingAlertStore {
    async fn list_active_alerts_with_tickers(&self) -> Result<Vec<AlertCandidate>, StoreError> {
        panic!("cursor poisoned");
    }

    async fn update_last_triggered(&self, _alert_id: ObjectId, _at: i64) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Alert store whose backend is down.
pub struct UnreachableAlertStore;

#[async_trait]
impl AlertStore for UnreachableAlertStore {
    async fn list_active_alerts_with_tickers(&self) -> Result<Vec<AlertCandidate>, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    async fn update_last_triggered(&self, _alert_id: ObjectId, _at: i64) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
}

pub fn engine(store: &Arc<MemoryStore>, sender: Option<Arc<dyn NotificationSender>>) -> AlertEngine {
    AlertEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        sender,
        EngineConfig::default(),
    )
}

/// Engine whose alert and event stores go through `faulty`; locks stay on `store`.
pub fn faulty_engine(
    store: &Arc<MemoryStore>,
    faulty: &Arc<FaultyStore>,
    sender: Option<Arc<dyn NotificationSender>>,
) -> AlertEngine {
    AlertEngine::new(
        faulty.clone(),
        faulty.clone(),
        store.clone(),
        sender,
        EngineConfig::default(),
    )
}

pub fn blank_alert(kind: AlertKind, ticker_id: ObjectId, user_id: ObjectId) -> Alert {
    Alert {
        id: ObjectId::new(),
        user_id,
        ticker_id,
        kind,
        price_above: None,
        price_below: None,
        volume_above: None,
        change_percent: None,
        is_active: true,
        last_triggered: None,
    }
}

/// Seeds a ticker, its owner and one alert built by `configure`. Returns the alert id.
pub async fn seed_alert(
    store: &MemoryStore,
    kind: AlertKind,
    ticker: (f64, f64, f64),
    configure: impl FnOnce(&mut Alert),
) -> ObjectId {
    let ticker_id = ObjectId::new();
    let user_id = ObjectId::new();

    store
        .upsert_ticker(TickerSnapshot {
            id: ticker_id,
            symbol: "SNDL".to_string(),
            name: "Sundial Growers".to_string(),
            price: ticker.0,
            volume: ticker.1,
            change_percent_24h: ticker.2,
        })
        .await;
    store.insert_user(user_id, "trader@example.com").await;

    let mut alert = blank_alert(kind, ticker_id, user_id);
    configure(&mut alert);
    let id = alert.id;
    store.insert_alert(alert).await;

    id
}

/// PRICE_ABOVE 10.00 against a ticker at 12.50.
pub async fn seed_price_above(store: &MemoryStore) -> ObjectId {
    seed_alert(store, AlertKind::PriceAbove, (12.5, 0.0, 0.0), |a| a.price_above = Some(10.0)).await
}
