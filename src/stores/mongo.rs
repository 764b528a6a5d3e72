use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use futures_util::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};

use super::{
    AlertCandidate, AlertStore, EventAlertInfo, EventPage, EventQuery, JobLockStore, ListedEvent, NotificationStore,
};
use crate::{
    error::StoreError,
    models::{Alert, AlertEvent, EventStatus, EventUpdate, JobLockRecord, TickerSnapshot, User},
};

pub const ALERTS: &str = "alerts";
pub const TICKERS: &str = "tickers";
pub const USERS: &str = "users";
pub const ALERT_EVENTS: &str = "alert_events";
pub const JOB_LOCKS: &str = "job_locks";

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn alerts(&self) -> Collection<Alert> {
        self.db.collection::<Alert>(ALERTS)
    }

    fn events(&self) -> Collection<AlertEvent> {
        self.db.collection::<AlertEvent>(ALERT_EVENTS)
    }

    fn locks(&self) -> Collection<JobLockRecord> {
        self.db.collection::<JobLockRecord>(JOB_LOCKS)
    }

    async fn alerts_by_id(&self, ids: Vec<ObjectId>) -> Result<HashMap<ObjectId, Alert>, StoreError> {
        let alerts = collect(self.alerts().find(doc! { "_id": { "$in": ids } }, None).await?).await?;
        Ok(alerts.into_iter().map(|a| (a.id, a)).collect())
    }

    async fn tickers_by_id(&self, ids: Vec<ObjectId>) -> Result<HashMap<ObjectId, TickerSnapshot>, StoreError> {
        let tickers = collect(
            self.db
                .collection::<TickerSnapshot>(TICKERS)
                .find(doc! { "_id": { "$in": ids } }, None)
                .await?,
        )
        .await?;
        Ok(tickers.into_iter().map(|t| (t.id, t)).collect())
    }

    async fn users_by_id(&self, ids: Vec<ObjectId>) -> Result<HashMap<ObjectId, User>, StoreError> {
        let users = collect(self.db.collection::<User>(USERS).find(doc! { "_id": { "$in": ids } }, None).await?).await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }
}

fn distinct(ids: impl Iterator<Item = ObjectId>) -> Vec<ObjectId> {
    ids.collect::<HashSet<_>>().into_iter().collect()
}

async fn collect<T>(mut cursor: mongodb::Cursor<T>) -> Result<Vec<T>, StoreError>
where
    T: serde::de::DeserializeOwned + Unpin + Send + Sync,
{
    let mut items = Vec::new();
    while let Some(item) = cursor.next().await {
        items.push(item?);
    }
    Ok(items)
}

#[async_trait]
impl AlertStore for MongoStore {
    async fn list_active_alerts_with_tickers(&self) -> Result<Vec<AlertCandidate>, StoreError> {
        let alerts = collect(self.alerts().find(doc! { "is_active": true }, None).await?).await?;
        if alerts.is_empty() {
            return Ok(Vec::new());
        }

        // one round trip per collection instead of one per alert
        let tickers = self.tickers_by_id(distinct(alerts.iter().map(|a| a.ticker_id))).await?;
        let users = self.users_by_id(distinct(alerts.iter().map(|a| a.user_id))).await?;

        let mut out = Vec::with_capacity(alerts.len());
        for alert in alerts {
            let (Some(ticker), Some(owner)) = (tickers.get(&alert.ticker_id), users.get(&alert.user_id)) else {
                tracing::warn!(alert_id = %alert.id, "alert references a missing ticker or user");
                continue;
            };

            out.push(AlertCandidate {
                ticker: ticker.clone(),
                owner_email: owner.email.clone(),
                alert,
            });
        }

        Ok(out)
    }

    async fn update_last_triggered(&self, alert_id: ObjectId, at: i64) -> Result<(), StoreError> {
        let res = self
            .alerts()
            .update_one(doc! { "_id": alert_id }, doc! { "$set": { "last_triggered": at } }, None)
            .await?;

        if res.matched_count == 0 {
            return Err(StoreError::NotFound(format!("alert {alert_id}")));
        }
        Ok(())
    }
}

fn event_filter(query: &EventQuery) -> Document {
    let mut filter = Document::new();

    if let Some(status) = query.status {
        filter.insert("status", status.as_str());
    }
    if let Some(alert_id) = query.alert_id {
        filter.insert("alert_id", alert_id);
    }
    if query.triggered_from.is_some() || query.triggered_to.is_some() {
        let mut range = Document::new();
        if let Some(from) = query.triggered_from {
            range.insert("$gte", from);
        }
        if let Some(to) = query.triggered_to {
            range.insert("$lte", to);
        }
        filter.insert("triggered_at", range);
    }

    filter
}

#[async_trait]
impl NotificationStore for MongoStore {
    async fn create_event(
        &self,
        alert_id: ObjectId,
        triggered_at: i64,
        time_bucket: i64,
        measured_value: f64,
    ) -> Result<AlertEvent, StoreError> {
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

        // the unique (alert_id, time_bucket) index turns a duplicate into code 11000
        self.events().insert_one(&event, None).await?;
        Ok(event)
    }

    async fn find_event(
        &self,
        alert_id: ObjectId,
        time_bucket: i64,
    ) -> Result<Option<AlertEvent>, StoreError> {
        Ok(self
            .events()
            .find_one(doc! { "alert_id": alert_id, "time_bucket": time_bucket }, None)
            .await?)
    }

    async fn update_event_status(
        &self,
        event_id: ObjectId,
        update: EventUpdate,
    ) -> Result<(), StoreError> {
        let set = match &update {
            EventUpdate::Sent { sent_at } => doc! {
                "status": update.status().as_str(),
                "sent_at": *sent_at,
            },
            EventUpdate::Failed { error_message } => doc! {
                "status": update.status().as_str(),
                "error_message": error_message.as_str(),
            },
        };

        let res = self
            .events()
            .update_one(doc! { "_id": event_id }, doc! { "$set": set }, None)
            .await?;

        if res.matched_count == 0 {
            return Err(StoreError::NotFound(format!("alert event {event_id}")));
        }
        Ok(())
    }

    async fn list_events(&self, query: &EventQuery) -> Result<EventPage, StoreError> {
        let filter = event_filter(query);
        let total = self.events().count_documents(filter.clone(), None).await?;

        let find_opts = FindOptions::builder()
            .sort(doc! { "triggered_at": -1 })
            .skip(query.skip)
            .limit(query.limit)
            .build();

        let events = collect(self.events().find(filter, find_opts).await?).await?;
        if events.is_empty() {
            return Ok(EventPage { events: Vec::new(), total });
        }

        let alerts = self.alerts_by_id(distinct(events.iter().map(|e| e.alert_id))).await?;
        let tickers = self.tickers_by_id(distinct(alerts.values().map(|a| a.ticker_id))).await?;
        let users = self.users_by_id(distinct(alerts.values().map(|a| a.user_id))).await?;

        let events = events
            .into_iter()
            .map(|event| {
                let alert = alerts.get(&event.alert_id).map(|alert| EventAlertInfo {
                    owner: users.get(&alert.user_id).cloned(),
                    ticker: tickers.get(&alert.ticker_id).cloned(),
                    alert: alert.clone(),
                });
                ListedEvent { event, alert }
            })
            .collect();

        Ok(EventPage { events, total })
    }
}

#[async_trait]
impl JobLockStore for MongoStore {
    async fn insert_lock_if_absent(&self, record: &JobLockRecord) -> Result<(), StoreError> {
        // `_id` is the job type, so a second insert is a duplicate key
        self.locks().insert_one(record, None).await?;
        Ok(())
    }

    async fn find_lock(&self, job_type: &str) -> Result<Option<JobLockRecord>, StoreError> {
        Ok(self.locks().find_one(doc! { "_id": job_type }, None).await?)
    }

    async fn replace_if_expired(&self, record: &JobLockRecord, now: i64) -> Result<bool, StoreError> {
        let res = self
            .locks()
            .update_one(
                doc! { "_id": record.job_type.as_str(), "expires_at": { "$lt": now } },
                doc! {
                    "$set": {
                        "locked_by": record.locked_by.as_str(),
                        "locked_at": record.locked_at,
                        "expires_at": record.expires_at,
                    }
                },
                None,
            )
            .await?;

        Ok(res.matched_count == 1)
    }

    async fn delete_lock(&self, job_type: &str) -> Result<(), StoreError> {
        self.locks().delete_one(doc! { "_id": job_type }, None).await?;
        Ok(())
    }
}
