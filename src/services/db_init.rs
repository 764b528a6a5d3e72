use mongodb::{
    bson::doc,
    options::IndexOptions,
    Database, IndexModel,
};

use crate::{
    error::StoreError,
    stores::mongo::{ALERTS, ALERT_EVENTS},
};

pub async fn ensure_indexes(db: &Database) -> Result<(), StoreError> {
    // alert_events: one row per (alert_id, time_bucket); this is the idempotency key
    {
        let col = db.collection::<mongodb::bson::Document>(ALERT_EVENTS);
        let model = IndexModel::builder()
            .keys(doc! { "alert_id": 1, "time_bucket": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("alert_event_idempotency_5m".to_string())
                    .build(),
            )
            .build();

        col.create_index(model, None).await?;
    }

    // alert_events: admin listing sorts by triggered_at desc
    {
        let col = db.collection::<mongodb::bson::Document>(ALERT_EVENTS);
        let model = IndexModel::builder()
            .keys(doc! { "status": 1, "triggered_at": -1 })
            .build();

        col.create_index(model, None).await?;
    }

    // alerts: monitor scan
    {
        let col = db.collection::<mongodb::bson::Document>(ALERTS);
        let model = IndexModel::builder()
            .keys(doc! { "is_active": 1 })
            .build();

        col.create_index(model, None).await?;
    }

    // job_locks needs nothing extra: the job type is `_id`

    Ok(())
}
