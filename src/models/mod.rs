pub mod alert;
pub mod ticker;
pub mod alert_event;
pub mod job_lock;
pub mod user;

pub use alert::{Alert, AlertKind};
pub use ticker::TickerSnapshot;
pub use alert_event::{AlertEvent, EventStatus, EventUpdate};
pub use job_lock::JobLockRecord;
pub use user::User;
