use async_trait::async_trait;
use chrono::DateTime;

use crate::{error::SendError, models::AlertKind, services::alert_evaluator::AlertTrigger};

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Delivery transport for alert notifications.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError>;
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn format_value(kind: AlertKind, value: f64) -> String {
    match kind {
        AlertKind::PriceAbove | AlertKind::PriceBelow => format!("${:.2}", value),
        AlertKind::VolumeAbove => {
            let sign = if value < 0.0 { "-" } else { "" };
            // grouped integer part, fraction kept to at most three places
            let thousandths = (value.abs() * 1000.0).round() as u64;
            let mut out = format!("{sign}{}", group_thousands(thousandths / 1000));
            let frac = thousandths % 1000;
            if frac > 0 {
                out.push('.');
                out.push_str(format!("{frac:03}").trim_end_matches('0'));
            }
            out
        }
        AlertKind::ChangePercent => {
            let sign = if value > 0.0 { "+" } else { "" };
            format!("{sign}{:.2}%", value)
        }
        AlertKind::Unknown => value.to_string(),
    }
}

pub fn subject_for(trigger: &AlertTrigger) -> String {
    format!("Alert: {} {}", trigger.ticker_symbol, trigger.kind.label())
}

fn html_body(trigger: &AlertTrigger, site_url: &str, now: i64) -> String {
    let when = DateTime::from_timestamp_millis(now)
        .map(|d| d.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_default();
    let site = site_url.trim_end_matches('/');
    let sym = &trigger.ticker_symbol;

    format!(
        r#"<h2>Stock Alert Triggered</h2>
<h3>{sym} - {name}</h3>
<p><strong>Alert Type:</strong> {label}</p>
<p><strong>Current Value:</strong> {current}</p>
<p><strong>Threshold:</strong> {threshold}</p>
<p><strong>Triggered:</strong> {when}</p>
<p><a href="{site}/ticker/{sym}">View {sym} Details</a></p>
<p>This alert was sent because you have an active alert set up for {sym}. You can manage your alerts in your <a href="{site}/user/dashboard">dashboard</a>.</p>
<p><small>This information is for informational purposes only and should not be considered as financial advice.</small></p>"#,
        name = trigger.ticker_name,
        label = trigger.kind.label(),
        current = format_value(trigger.kind, trigger.measured_value),
        threshold = format_value(trigger.kind, trigger.threshold),
    )
}

pub fn compose(trigger: &AlertTrigger, from: &str, site_url: &str, now: i64) -> OutboundMessage {
    OutboundMessage {
        from: from.to_string(),
        to: trigger.user_email.clone(),
        subject: subject_for(trigger),
        html: html_body(trigger, site_url, now),
    }
}
