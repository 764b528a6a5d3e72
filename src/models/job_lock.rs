use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLockRecord {
    // job type is the primary key, so at most one row per job
    #[serde(rename = "_id")]
    pub job_type: String,

    pub locked_by: String,
    pub locked_at: i64,
    pub expires_at: i64,
}

impl JobLockRecord {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at < now
    }
}
