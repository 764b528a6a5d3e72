use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use tokio::sync::Mutex;

use super::{
    AlertCandidate, AlertStore, EventAlertInfo, EventPage, EventQuery, JobLockStore, ListedEvent, NotificationStore,
};
use crate::{
    error::StoreError,
    models::{Alert, AlertEvent, EventStatus, EventUpdate, JobLockRecord, TickerSnapshot, User},
};

#[derive(Default)]
struct Tables {
    alerts: Vec<Alert>,
    tickers: HashMap<ObjectId, TickerSnapshot>,
    emails: HashMap<ObjectId, String>,
    events: Vec<AlertEvent>,
    locks: HashMap<String, JobLockRecord>,
}

/// In-process store with the same uniqueness guarantees as the Mongo indexes.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user_id: ObjectId, email: &str) {
        self.tables.lock().await.emails.insert(user_id, email.to_string());
    }

    pub async fn upsert_ticker(&self, ticker: TickerSnapshot) {
        self.tables.lock().await.tickers.insert(ticker.id, ticker);
    }

    pub async fn insert_alert(&self, alert: Alert) {
        self.tables.lock().await.alerts.push(alert);
    }

    pub async fn alert(&self, alert_id: ObjectId) -> Option<Alert> {
        let t = self.tables.lock().await;
        t.alerts.iter().find(|a| a.id == alert_id).cloned()
    }

    pub async fn events_for(&self, alert_id: ObjectId) -> Vec<AlertEvent> {
        let t = self.tables.lock().await;
        t.events.iter().filter(|e| e.alert_id == alert_id).cloned().collect()
    }

    pub async fn lock_record(&self, job_type: &str) -> Option<JobLockRecord> {
        self.tables.lock().await.locks.get(job_type).cloned()
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn list_active_alerts_with_tickers(&self) -> Result<Vec<AlertCandidate>, StoreError> {
        let t = self.tables.lock().await;

        let mut out = Vec::new();
        for alert in t.alerts.iter().filter(|a| a.is_active) {
            let (Some(ticker), Some(email)) = (t.tickers.get(&alert.ticker_id), t.emails.get(&alert.user_id)) else {
                tracing::warn!(alert_id = %alert.id, "alert references a missing ticker or user");
                continue;
            };

            out.push(AlertCandidate {
                alert: alert.clone(),
                ticker: ticker.clone(),
                owner_email: email.clone(),
            });
        }

        Ok(out)
    }

    async fn update_last_triggered(&self, alert_id: ObjectId, at: i64) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        let alert = t
            .alerts
            .iter_mut()
            .find(|a| a.id == alert_id)
            .ok_or_else(|| StoreError::NotFound(format!("alert {alert_id}")))?;

        alert.last_triggered = Some(at);
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create_event(
        &self,
        alert_id: ObjectId,
        triggered_at: i64,
        time_bucket: i64,
        measured_value: f64,
    ) -> Result<AlertEvent, StoreError> {
        let mut t = self.tables.lock().await;

        if t.events.iter().any(|e| e.alert_id == alert_id && e.time_bucket == time_bucket) {
            return Err(StoreError::UniqueViolation(format!(
                "alert_events (alert_id={alert_id}, time_bucket={time_bucket})"
            )));
        }

        let event = AlertEvent {
            id: ObjectId::new(),
            alert_id,
            triggered_at,
            time_bucket,
            measured_value,
            status: EventStatus::Pending,
            sent_at: None,
            error_message: None,
        };
        t.events.push(event.clone());

        Ok(event)
    }

    async fn find_event(
        &self,
        alert_id: ObjectId,
        time_bucket: i64,
    ) -> Result<Option<AlertEvent>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.events
            .iter()
            .find(|e| e.alert_id == alert_id && e.time_bucket == time_bucket)
            .cloned())
    }

    async fn update_event_status(
        &self,
        event_id: ObjectId,
        update: EventUpdate,
    ) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        let event = t
            .events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| StoreError::NotFound(format!("alert event {event_id}")))?;

        update.apply(event);
        Ok(())
    }

    async fn list_events(&self, query: &EventQuery) -> Result<EventPage, StoreError> {
        let t = self.tables.lock().await;

        let mut matching: Vec<AlertEvent> = t.events.iter().filter(|e| query.matches(e)).cloned().collect();
        matching.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));

        let total = matching.len() as u64;
        let events = matching
            .into_iter()
            .skip(query.skip as usize)
            .take(query.limit.max(0) as usize)
            .map(|event| {
                let alert = t.alerts.iter().find(|a| a.id == event.alert_id).map(|alert| EventAlertInfo {
                    owner: t.emails.get(&alert.user_id).map(|email| User {
                        id: alert.user_id,
                        email: email.clone(),
                    }),
                    ticker: t.tickers.get(&alert.ticker_id).cloned(),
                    alert: alert.clone(),
                });
                ListedEvent { event, alert }
            })
            .collect();

        Ok(EventPage { events, total })
    }
}

#[async_trait]
impl JobLockStore for MemoryStore {
    async fn insert_lock_if_absent(&self, record: &JobLockRecord) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        if t.locks.contains_key(&record.job_type) {
            return Err(StoreError::UniqueViolation(format!("job_locks {}", record.job_type)));
        }
        t.locks.insert(record.job_type.clone(), record.clone());
        Ok(())
    }

    async fn find_lock(&self, job_type: &str) -> Result<Option<JobLockRecord>, StoreError> {
        Ok(self.tables.lock().await.locks.get(job_type).cloned())
    }

    async fn replace_if_expired(&self, record: &JobLockRecord, now: i64) -> Result<bool, StoreError> {
        let mut t = self.tables.lock().await;
        match t.locks.get_mut(&record.job_type) {
            Some(existing) if existing.is_expired(now) => {
                *existing = record.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_lock(&self, job_type: &str) -> Result<(), StoreError> {
        self.tables.lock().await.locks.remove(job_type);
        Ok(())
    }
}
