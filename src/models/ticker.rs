use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Market metrics of a ticker as last written by the price updater.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerSnapshot {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub symbol: String,
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub change_percent_24h: f64,
}
