use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Pending,
    Sent,
    Failed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "PENDING",
            EventStatus::Sent => "SENT",
            EventStatus::Failed => "FAILED",
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(EventStatus::Pending),
            "SENT" => Ok(EventStatus::Sent),
            "FAILED" => Ok(EventStatus::Failed),
            other => Err(format!("unknown event status: {other}")),
        }
    }
}

/// Delivery record for one firing of an alert. Unique per `(alert_id, time_bucket)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub alert_id: ObjectId,
    pub triggered_at: i64,
    pub time_bucket: i64,
    pub measured_value: f64,

    pub status: EventStatus,
    #[serde(default)]
    pub sent_at: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Status transition applied after a send attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EventUpdate {
    Sent { sent_at: i64 },
    Failed { error_message: String },
}

impl EventUpdate {
    pub fn status(&self) -> EventStatus {
        match self {
            EventUpdate::Sent { .. } => EventStatus::Sent,
            EventUpdate::Failed { .. } => EventStatus::Failed,
        }
    }

    pub fn apply(&self, event: &mut AlertEvent) {
        match self {
            EventUpdate::Sent { sent_at } => {
                event.status = EventStatus::Sent;
                event.sent_at = Some(*sent_at);
            }
            EventUpdate::Failed { error_message } => {
                event.status = EventStatus::Failed;
                event.error_message = Some(error_message.clone());
            }
        }
    }
}
