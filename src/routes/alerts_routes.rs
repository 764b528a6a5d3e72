use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::{auth, controllers::alerts_controller, AppState};

pub fn add_routes(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    let admin = Router::<AppState>::new()
        .route("/admin/alerts/evaluate", post(alerts_controller::post_evaluate))
        .route("/admin/alerts/events", get(alerts_controller::get_events))
        .route_layer(from_fn_with_state(state.clone(), auth::require_admin_token));

    // external schedulers differ on the verb, accept both
    let cron = Router::<AppState>::new()
        .route(
            "/cron/evaluate-alerts",
            get(alerts_controller::cron_evaluate).post(alerts_controller::cron_evaluate),
        )
        .route_layer(from_fn_with_state(state.clone(), auth::require_cron_secret));

    router.merge(admin).merge(cron)
}
