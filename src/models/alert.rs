use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    PriceAbove,
    PriceBelow,
    VolumeAbove,
    ChangePercent,
    // anything the engine does not know how to evaluate
    #[serde(other)]
    Unknown,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::PriceAbove => "PRICE_ABOVE",
            AlertKind::PriceBelow => "PRICE_BELOW",
            AlertKind::VolumeAbove => "VOLUME_ABOVE",
            AlertKind::ChangePercent => "CHANGE_PERCENT",
            AlertKind::Unknown => "UNKNOWN",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::PriceAbove => "Price Alert (Above Threshold)",
            AlertKind::PriceBelow => "Price Alert (Below Threshold)",
            AlertKind::VolumeAbove => "Volume Alert",
            AlertKind::ChangePercent => "Price Change Alert",
            AlertKind::Unknown => "Alert Triggered",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub user_id: ObjectId,
    pub ticker_id: ObjectId,

    pub kind: AlertKind,

    // only the field matching `kind` is read
    #[serde(default)]
    pub price_above: Option<f64>,
    #[serde(default)]
    pub price_below: Option<f64>,
    #[serde(default)]
    pub volume_above: Option<f64>,
    #[serde(default)]
    pub change_percent: Option<f64>,

    pub is_active: bool,

    // unix millis of the last confirmed delivery
    #[serde(default)]
    pub last_triggered: Option<i64>,
}

impl Alert {
    /// Threshold relevant to this alert's kind, if it was configured.
    pub fn threshold(&self) -> Option<f64> {
        match self.kind {
            AlertKind::PriceAbove => self.price_above,
            AlertKind::PriceBelow => self.price_below,
            AlertKind::VolumeAbove => self.volume_above,
            AlertKind::ChangePercent => self.change_percent,
            AlertKind::Unknown => None,
        }
    }
}
