use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mongodb::Client;
use tracing_subscriber::EnvFilter;

use pennywatch::{
    config, routes,
    services::{self, alert_monitor, db_init, notifications::NotificationSender, resend::ResendSender},
    stores::mongo::MongoStore,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = config::load();

    // Mongo connection
    let client = Client::with_uri_str(&settings.mongodb_uri).await?;
    let db = client.database(&settings.mongodb_db);

    if let Err(e) = db_init::ensure_indexes(&db).await {
        tracing::error!(error = %e, "failed to ensure indexes");
        return Err(e.into());
    }

    let store = Arc::new(MongoStore::new(db));
    let sender = ResendSender::from_api_key(&settings.resend_api_key)
        .map(|s| Arc::new(s) as Arc<dyn NotificationSender>);

    let engine = Arc::new(services::AlertEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        sender,
        settings.engine_config(),
    ));

    if settings.eval_interval_secs > 0 {
        alert_monitor::spawn_alert_monitor(engine.clone(), Duration::from_secs(settings.eval_interval_secs));
        tracing::info!(every_secs = settings.eval_interval_secs, "alert monitor started");
    }

    let state = AppState {
        settings: settings.clone(),
        engine,
        events: store,
    };

    let ip = settings.host.parse::<std::net::IpAddr>()?;
    let addr = SocketAddr::from((ip, settings.port));
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, routes::app(state)).await?;

    Ok(())
}
