use std::env;
use std::time::Duration;

use crate::services::EngineConfig;

#[derive(Debug, Clone)]
pub struct Settings {
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub host: String,
    pub port: u16,

    // bearer secrets for the trigger endpoints; empty rejects every request
    pub cron_secret: String,
    pub admin_token: String,

    pub resend_api_key: String,
    pub alerts_from_address: String,
    pub site_url: String,

    // 0 disables the in-process scheduler
    pub eval_interval_secs: u64,
    pub job_lock_ttl_secs: u64,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn var_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

pub fn load() -> Settings {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    let port = env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    Settings {
        mongodb_uri: var_or("MONGODB_URI", "mongodb://localhost:27017"),
        mongodb_db: var_or("MONGODB_DB", "pennywatch"),
        host: var_or("HOST", "127.0.0.1"),
        port,
        cron_secret: var_or("CRON_SECRET", ""),
        admin_token: var_or("ADMIN_TOKEN", ""),
        resend_api_key: var_or("RESEND_API_KEY", ""),
        alerts_from_address: var_or("ALERTS_FROM_ADDRESS", "alerts@pennystockstracker.com"),
        site_url: var_or("SITE_URL", "https://pennystockstracker.com"),
        eval_interval_secs: var_u64("ALERT_EVAL_INTERVAL_SECS", 300),
        job_lock_ttl_secs: var_u64("JOB_LOCK_TTL_SECS", 600),
    }
}

impl Settings {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            lock_ttl: Duration::from_secs(self.job_lock_ttl_secs),
            from_address: self.alerts_from_address.clone(),
            site_url: self.site_url.clone(),
        }
    }
}
