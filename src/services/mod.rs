pub mod time_bucket;
pub mod job_lock;
pub mod alert_evaluator;
pub mod notifications;
pub mod resend;
pub mod evaluation_run;
pub mod alert_monitor;
pub mod db_init;

pub use evaluation_run::{AlertEngine, AlertOutcome, EngineConfig, EvaluationSummary};
