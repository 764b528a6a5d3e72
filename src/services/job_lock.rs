use std::sync::Arc;
use std::time::Duration;

use crate::{error::StoreError, models::JobLockRecord, stores::JobLockStore};

pub const ALERT_EVALUATION: &str = "ALERT_EVALUATION";

/// Run-level mutex with expiry, stored as one row per job type.
#[derive(Clone)]
pub struct JobLock {
    store: Arc<dyn JobLockStore>,
}

impl JobLock {
    pub fn new(store: Arc<dyn JobLockStore>) -> Self {
        Self { store }
    }

    /// Opaque id for one holder of the lock.
    pub fn new_holder_id(now: i64) -> String {
        format!("{}-{}", now, uuid::Uuid::new_v4().simple())
    }

    /// Returns `Ok(false)` when a live holder already has the lock. That is a normal
    /// outcome, not an error.
    pub async fn acquire(
        &self,
        job_type: &str,
        holder: &str,
        ttl: Duration,
        now: i64,
    ) -> Result<bool, StoreError> {
        let record = JobLockRecord {
            job_type: job_type.to_string(),
            locked_by: holder.to_string(),
            locked_at: now,
            expires_at: now + ttl.as_millis() as i64,
        };

        match self.store.insert_lock_if_absent(&record).await {
            Ok(()) => {
                tracing::info!(job_type, holder, "job lock acquired");
                return Ok(true);
            }
            Err(e) if e.is_unique_violation() => {}
            Err(e) => return Err(e),
        }

        let Some(existing) = self.store.find_lock(job_type).await? else {
            // released between our insert and read; next trigger will get it
            tracing::info!(job_type, "job lock released concurrently, not retrying");
            return Ok(false);
        };

        if !existing.is_expired(now) {
            tracing::info!(
                job_type,
                held_by = %existing.locked_by,
                expires_at = existing.expires_at,
                "job lock already held"
            );
            return Ok(false);
        }

        // conditional on expiry, so two stealers cannot both win
        let replaced = self.store.replace_if_expired(&record, now).await?;
        if replaced {
            tracing::warn!(job_type, holder, previous = %existing.locked_by, "expired job lock replaced");
        } else {
            tracing::info!(job_type, "lost race replacing expired job lock");
        }

        Ok(replaced)
    }

    /// Never fails: the TTL bounds the damage of a lock that could not be deleted.
    pub async fn release(&self, job_type: &str) {
        match self.store.delete_lock(job_type).await {
            Ok(()) => tracing::info!(job_type, "job lock released"),
            Err(e) => tracing::error!(job_type, error = %e, "failed to release job lock"),
        }
    }
}
