//! Storage seams used by the alert engine.
//!
//! The engine never talks to a database directly; it goes through these traits.
//! `mongo` is the production backend, `memory` keeps everything in process and
//! enforces the same uniqueness rules.

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use crate::{
    error::StoreError,
    models::{Alert, AlertEvent, EventStatus, EventUpdate, JobLockRecord, TickerSnapshot, User},
};

pub mod memory;
pub mod mongo;

/// An active alert joined with what is needed to evaluate and notify it.
#[derive(Debug, Clone)]
pub struct AlertCandidate {
    pub alert: Alert,
    pub ticker: TickerSnapshot,
    pub owner_email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrigin {
    Created,
    Reused,
}

/// Filter and page for the admin event listing.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub status: Option<EventStatus>,
    pub alert_id: Option<ObjectId>,
    pub triggered_from: Option<i64>,
    pub triggered_to: Option<i64>,
    pub skip: u64,
    pub limit: i64,
}

impl EventQuery {
    pub fn matches(&self, event: &AlertEvent) -> bool {
        self.status.map_or(true, |s| event.status == s)
            && self.alert_id.map_or(true, |id| event.alert_id == id)
            && self.triggered_from.map_or(true, |t| event.triggered_at >= t)
            && self.triggered_to.map_or(true, |t| event.triggered_at <= t)
    }
}

/// The alert behind a listed event. Owner and ticker are `None` when their rows
/// no longer exist.
#[derive(Debug, Clone)]
pub struct EventAlertInfo {
    pub alert: Alert,
    pub owner: Option<User>,
    pub ticker: Option<TickerSnapshot>,
}

#[derive(Debug, Clone)]
pub struct ListedEvent {
    pub event: AlertEvent,
    pub alert: Option<EventAlertInfo>,
}

#[derive(Debug, Clone)]
pub struct EventPage {
    pub events: Vec<ListedEvent>,
    pub total: u64,
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn list_active_alerts_with_tickers(&self) -> Result<Vec<AlertCandidate>, StoreError>;

    async fn update_last_triggered(&self, alert_id: ObjectId, at: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Inserts a PENDING event. Fails with `StoreError::UniqueViolation` when a row
    /// for `(alert_id, time_bucket)` already exists.
    async fn create_event(
        &self,
        alert_id: ObjectId,
        triggered_at: i64,
        time_bucket: i64,
        measured_value: f64,
    ) -> Result<AlertEvent, StoreError>;

    async fn find_event(
        &self,
        alert_id: ObjectId,
        time_bucket: i64,
    ) -> Result<Option<AlertEvent>, StoreError>;

    async fn update_event_status(
        &self,
        event_id: ObjectId,
        update: EventUpdate,
    ) -> Result<(), StoreError>;

    /// Newest first, each event joined with its alert, owner and ticker.
    async fn list_events(&self, query: &EventQuery) -> Result<EventPage, StoreError>;

    /// Insert first and fall back to the existing row on a unique violation, so the
    /// uniqueness check and the write are one atomic store operation.
    async fn create_or_reuse_event(
        &self,
        alert_id: ObjectId,
        triggered_at: i64,
        time_bucket: i64,
        measured_value: f64,
    ) -> Result<(AlertEvent, EventOrigin), StoreError> {
        match self
            .create_event(alert_id, triggered_at, time_bucket, measured_value)
            .await
        {
            Ok(event) => Ok((event, EventOrigin::Created)),
            Err(err) if err.is_unique_violation() => {
                match self.find_event(alert_id, time_bucket).await? {
                    Some(existing) => Ok((existing, EventOrigin::Reused)),
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }
}

/// Primitives the job lock is built on.
#[async_trait]
pub trait JobLockStore: Send + Sync {
    /// `StoreError::UniqueViolation` when a record for the job type exists.
    async fn insert_lock_if_absent(&self, record: &JobLockRecord) -> Result<(), StoreError>;

    async fn find_lock(&self, job_type: &str) -> Result<Option<JobLockRecord>, StoreError>;

    /// Replaces the record only if its `expires_at` is before `now`. Returns whether
    /// the replacement happened.
    async fn replace_if_expired(&self, record: &JobLockRecord, now: i64) -> Result<bool, StoreError>;

    async fn delete_lock(&self, job_type: &str) -> Result<(), StoreError>;
}
