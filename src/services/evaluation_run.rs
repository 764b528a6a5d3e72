//! One evaluation pass over every active alert.
//!
//! Per alert the steps are strictly ordered: create or reuse the event row for the
//! current time bucket, attempt delivery, record the delivery status, and only then
//! move `last_triggered`. A failure in one alert is recorded in the summary and the
//! pass moves on to the next one.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use serde::Serialize;

use crate::{
    error::{EngineError, SendError},
    models::{AlertEvent, EventStatus, EventUpdate},
    services::{
        alert_evaluator::{self, AlertTrigger, Evaluation},
        job_lock::{JobLock, ALERT_EVALUATION},
        notifications::{self, NotificationSender},
        time_bucket,
    },
    stores::{AlertCandidate, AlertStore, EventOrigin, JobLockStore, NotificationStore},
};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub lock_ttl: Duration,
    pub from_address: String,
    pub site_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(10 * 60),
            from_address: "alerts@pennystockstracker.com".to_string(),
            site_url: "https://pennystockstracker.com".to_string(),
        }
    }
}

/// Aggregate returned to whoever triggered the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSummary {
    pub evaluated: usize,
    pub triggered: usize,
    pub sent: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    // another run held the lock; nothing was touched
    pub already_running: bool,
}

/// Terminal state of one alert within a run.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertOutcome {
    SkippedNoFire,
    SkippedCooldown,
    Delivered,
    // the send went through but recording it did not
    DeliveredUnrecorded(String),
    SendFailed(String),
    // the bucket's event was already SENT; no second send
    AlreadyDelivered,
}

pub struct AlertEngine {
    alerts: Arc<dyn AlertStore>,
    events: Arc<dyn NotificationStore>,
    lock: JobLock,
    sender: Option<Arc<dyn NotificationSender>>,
    config: EngineConfig,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl AlertEngine {
    pub fn new(
        alerts: Arc<dyn AlertStore>,
        events: Arc<dyn NotificationStore>,
        locks: Arc<dyn JobLockStore>,
        sender: Option<Arc<dyn NotificationSender>>,
        config: EngineConfig,
    ) -> Self {
        if sender.is_none() {
            tracing::warn!("no notification sender configured, alert deliveries will be marked FAILED");
        }

        Self {
            alerts,
            events,
            lock: JobLock::new(locks),
            sender,
            config,
        }
    }

    pub async fn run(&self) -> EvaluationSummary {
        self.run_at(Utc::now().timestamp_millis()).await
    }

    /// Runs a full pass as of `now` (unix millis).
    pub async fn run_at(&self, now: i64) -> EvaluationSummary {
        let mut summary = EvaluationSummary::default();
        let holder = JobLock::new_holder_id(now);

        match self.lock.acquire(ALERT_EVALUATION, &holder, self.config.lock_ttl, now).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!("alert evaluation already running, skipping this execution");
                summary.already_running = true;
                return summary;
            }
            Err(e) => {
                tracing::error!(error = %e, "could not acquire alert evaluation lock");
                summary.errors.push(format!("System error: could not acquire job lock: {e}"));
                return summary;
            }
        }

        tracing::info!(holder = %holder, "alert evaluation started");

        // per-alert panics are handled in process_all; this catches the rest
        let pass = AssertUnwindSafe(self.process_all(now, &mut summary)).catch_unwind().await;
        if let Err(payload) = pass {
            let msg = panic_message(payload.as_ref());
            tracing::error!(panic = %msg, "alert evaluation aborted");
            summary.errors.push(format!("System error: {msg}"));
        }

        self.lock.release(ALERT_EVALUATION).await;

        tracing::info!(
            evaluated = summary.evaluated,
            triggered = summary.triggered,
            sent = summary.sent,
            failed = summary.failed,
            errors = summary.errors.len(),
            "alert evaluation complete"
        );

        summary
    }

    async fn process_all(&self, now: i64, summary: &mut EvaluationSummary) {
        let candidates = match self.alerts.list_active_alerts_with_tickers().await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "failed to load active alerts");
                summary.errors.push(format!("System error: {e}"));
                return;
            }
        };

        summary.evaluated = candidates.len();

        for candidate in &candidates {
            let alert_id = candidate.alert.id;

            let processed = AssertUnwindSafe(self.process_alert(candidate, now, summary))
                .catch_unwind()
                .await;

            match processed {
                Ok(Ok(AlertOutcome::Delivered)) => summary.sent += 1,
                Ok(Ok(AlertOutcome::DeliveredUnrecorded(reason))) => {
                    summary.sent += 1;
                    summary.errors.push(format!("Alert {alert_id}: {reason}"));
                }
                Ok(Ok(AlertOutcome::SendFailed(reason))) => {
                    summary.failed += 1;
                    summary.errors.push(format!("Alert {alert_id}: {reason}"));
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::error!(alert_id = %alert_id, error = %e, "alert evaluation error");
                    summary.failed += 1;
                    summary.errors.push(format!("Alert {alert_id}: {e}"));
                }
                Err(payload) => {
                    let msg = panic_message(payload.as_ref());
                    tracing::error!(alert_id = %alert_id, panic = %msg, "alert processing panicked");
                    summary.failed += 1;
                    summary.errors.push(format!("Alert {alert_id}: {msg}"));
                }
            }
        }
    }

    async fn process_alert(
        &self,
        candidate: &AlertCandidate,
        now: i64,
        summary: &mut EvaluationSummary,
    ) -> Result<AlertOutcome, EngineError> {
        let evaluation =
            alert_evaluator::evaluate(&candidate.alert, &candidate.ticker, &candidate.owner_email, now)?;

        let trigger = match evaluation {
            Evaluation::NoFire => return Ok(AlertOutcome::SkippedNoFire),
            Evaluation::Cooldown => return Ok(AlertOutcome::SkippedCooldown),
            Evaluation::Fired(t) => t,
        };
        summary.triggered += 1;

        let bucket = time_bucket::bucket(now);
        let (event, origin) = self
            .events
            .create_or_reuse_event(trigger.alert_id, now, bucket, trigger.measured_value)
            .await?;

        match origin {
            EventOrigin::Created => {
                tracing::debug!(alert_id = %trigger.alert_id, event_id = %event.id, bucket, "alert event created")
            }
            EventOrigin::Reused => tracing::info!(
                alert_id = %trigger.alert_id,
                event_id = %event.id,
                bucket,
                status = event.status.as_str(),
                "reusing alert event"
            ),
        }

        if event.status == EventStatus::Sent {
            // delivered earlier in this bucket; re-apply the cooldown in case that write was lost
            let at = event.sent_at.unwrap_or(now);
            self.alerts.update_last_triggered(trigger.alert_id, at).await?;
            return Ok(AlertOutcome::AlreadyDelivered);
        }

        self.deliver(&trigger, &event, now).await
    }

    async fn deliver(
        &self,
        trigger: &AlertTrigger,
        event: &AlertEvent,
        now: i64,
    ) -> Result<AlertOutcome, EngineError> {
        let message = notifications::compose(trigger, &self.config.from_address, &self.config.site_url, now);

        let sent = match &self.sender {
            // a panicking transport fails this delivery, the row is still marked FAILED
            Some(sender) => AssertUnwindSafe(sender.send(&message))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(SendError::Transport(panic_message(payload.as_ref())))),
            None => Err(SendError::NotConfigured),
        };

        match sent {
            Ok(()) => {
                tracing::info!(
                    alert_id = %trigger.alert_id,
                    event_id = %event.id,
                    symbol = %trigger.ticker_symbol,
                    "alert notification sent"
                );

                // the email is out, so store failures past this point are reported, never counted as failed
                let recorded = match self
                    .events
                    .update_event_status(event.id, EventUpdate::Sent { sent_at: now })
                    .await
                {
                    // only after the SENT write, so a failed delivery stays retryable
                    Ok(_) => self.alerts.update_last_triggered(trigger.alert_id, now).await,
                    Err(e) => Err(e),
                };

                match recorded {
                    Ok(()) => Ok(AlertOutcome::Delivered),
                    Err(e) => {
                        tracing::error!(
                            alert_id = %trigger.alert_id,
                            event_id = %event.id,
                            error = %e,
                            "alert delivered but its bookkeeping failed"
                        );
                        Ok(AlertOutcome::DeliveredUnrecorded(format!("delivered but not recorded: {e}")))
                    }
                }
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(
                    alert_id = %trigger.alert_id,
                    event_id = %event.id,
                    error = %reason,
                    "alert notification failed"
                );

                self.events
                    .update_event_status(event.id, EventUpdate::Failed { error_message: reason.clone() })
                    .await?;
                Ok(AlertOutcome::SendFailed(reason))
            }
        }
    }
}
