use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

// Read only here; users are managed by the account side of the app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub email: String,
}
