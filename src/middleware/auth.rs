use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Constant-time compare; an empty secret never matches.
pub fn secret_matches(presented: Option<&str>, secret: &str) -> bool {
    let Some(presented) = presented else {
        return false;
    };
    if secret.is_empty() || presented.len() != secret.len() {
        return false;
    }

    presented
        .bytes()
        .zip(secret.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" }))).into_response()
}

pub async fn require_cron_secret(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !secret_matches(bearer_token(req.headers()), &state.settings.cron_secret) {
        tracing::warn!(path = %req.uri().path(), "unauthorized cron request");
        return unauthorized();
    }
    next.run(req).await
}

pub async fn require_admin_token(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !secret_matches(bearer_token(req.headers()), &state.settings.admin_token) {
        tracing::warn!(path = %req.uri().path(), "unauthorized admin request");
        return unauthorized();
    }
    next.run(req).await
}
