use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};

use super::evaluation_run::AlertEngine;

/// Periodic in-process trigger. Safe to run next to an external cron: overlapping
/// passes are turned away by the job lock.
pub fn spawn_alert_monitor(engine: Arc<AlertEngine>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            let summary = engine.run().await;
            if summary.already_running {
                tracing::debug!("alert monitor tick skipped, evaluation already running");
                continue;
            }

            if summary.failed > 0 || !summary.errors.is_empty() {
                tracing::warn!(
                    failed = summary.failed,
                    errors = ?summary.errors,
                    "alert monitor tick finished with failures"
                );
            }
        }
    })
}
