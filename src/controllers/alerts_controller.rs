use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    models::{AlertKind, EventStatus},
    stores::{EventAlertInfo, EventQuery, ListedEvent},
    AppState,
};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

fn iso(ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(ms).map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
}

// ---------------- Triggers ----------------

// POST /admin/alerts/evaluate
pub async fn post_evaluate(State(state): State<AppState>) -> Response {
    tracing::info!("manual alert evaluation triggered by admin");
    let result = state.engine.run().await;

    (
        StatusCode::OK,
        Json(json!({ "message": "Alert evaluation completed", "result": result })),
    )
        .into_response()
}

// GET|POST /cron/evaluate-alerts
pub async fn cron_evaluate(State(state): State<AppState>) -> Response {
    tracing::info!("scheduled alert evaluation starting");
    let result = state.engine.run().await;

    tracing::info!(
        evaluated = result.evaluated,
        triggered = result.triggered,
        sent = result.sent,
        failed = result.failed,
        error_count = result.errors.len(),
        already_running = result.already_running,
        "scheduled alert evaluation completed"
    );

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "result": result,
        })),
    )
        .into_response()
}

// ---------------- Event listing ----------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub status: Option<String>,
    pub alert_id: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserRef {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct TickerRef {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAlertView {
    pub id: String,
    pub kind: AlertKind,
    pub label: &'static str,
    pub threshold: Option<f64>,
    pub is_active: bool,
    pub user: Option<UserRef>,
    pub ticker: Option<TickerRef>,
}

impl From<EventAlertInfo> for EventAlertView {
    fn from(info: EventAlertInfo) -> Self {
        Self {
            id: info.alert.id.to_hex(),
            kind: info.alert.kind,
            label: info.alert.kind.label(),
            threshold: info.alert.threshold(),
            is_active: info.alert.is_active,
            user: info.owner.map(|u| UserRef { id: u.id.to_hex(), email: u.email }),
            ticker: info.ticker.map(|t| TickerRef {
                id: t.id.to_hex(),
                symbol: t.symbol,
                name: t.name,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    pub id: String,
    pub alert_id: String,
    pub triggered_at: Option<String>,
    pub time_bucket: i64,
    pub measured_value: f64,
    pub status: EventStatus,
    pub sent_at: Option<String>,
    pub error_message: Option<String>,
    // null when the alert was deleted after the event was written
    pub alert: Option<EventAlertView>,
}

impl From<ListedEvent> for EventView {
    fn from(listed: ListedEvent) -> Self {
        let e = listed.event;
        Self {
            id: e.id.to_hex(),
            alert_id: e.alert_id.to_hex(),
            triggered_at: iso(e.triggered_at),
            time_bucket: e.time_bucket,
            measured_value: e.measured_value,
            status: e.status,
            sent_at: e.sent_at.and_then(iso),
            error_message: e.error_message,
            alert: listed.alert.map(EventAlertView::from),
        }
    }
}

fn parse_date(field: &str, raw: &str, details: &mut Vec<String>) -> Option<i64> {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(d) => Some(d.timestamp_millis()),
        Err(_) => {
            details.push(format!("{field}: expected an RFC 3339 timestamp"));
            None
        }
    }
}

/// Validates the listing parameters. Returns the query plus `(page, limit)`, or
/// every problem found.
pub fn parse_events_params(p: &EventsParams) -> Result<(EventQuery, u64, i64), Vec<String>> {
    let mut details = Vec::new();

    let page = match p.page.as_deref().map(str::trim) {
        None | Some("") => 1,
        Some(raw) => match raw.parse::<u64>() {
            Ok(n) if n >= 1 => n,
            _ => {
                details.push("page: expected a positive integer".to_string());
                1
            }
        },
    };

    let limit = match p.limit.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_PAGE_SIZE,
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) if n >= 1 => n.min(MAX_PAGE_SIZE),
            _ => {
                details.push("limit: expected a positive integer".to_string());
                DEFAULT_PAGE_SIZE
            }
        },
    };

    let status = match p.status.as_deref() {
        None | Some("") => None,
        Some(raw) => match raw.parse::<EventStatus>() {
            Ok(s) => Some(s),
            Err(_) => {
                details.push("status: expected one of PENDING, SENT, FAILED".to_string());
                None
            }
        },
    };

    let alert_id = match p.alert_id.as_deref() {
        None | Some("") => None,
        Some(raw) => match ObjectId::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                details.push("alertId: expected a 24 character hex id".to_string());
                None
            }
        },
    };

    let triggered_from = p
        .date_from
        .as_deref()
        .filter(|s| !s.is_empty())
        .and_then(|raw| parse_date("dateFrom", raw, &mut details));
    let triggered_to = p
        .date_to
        .as_deref()
        .filter(|s| !s.is_empty())
        .and_then(|raw| parse_date("dateTo", raw, &mut details));

    if !details.is_empty() {
        return Err(details);
    }

    let query = EventQuery {
        status,
        alert_id,
        triggered_from,
        triggered_to,
        skip: (page - 1) * limit as u64,
        limit,
    };

    Ok((query, page, limit))
}

// GET /admin/alerts/events
pub async fn get_events(State(state): State<AppState>, Query(params): Query<EventsParams>) -> Response {
    let (query, page, limit) = match parse_events_params(&params) {
        Ok(v) => v,
        Err(details) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Validation failed", "details": details })),
            )
                .into_response();
        }
    };

    let result = match state.events.list_events(&query).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "admin alert events fetch error");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response();
        }
    };

    let pages = result.total.div_ceil(limit as u64);
    let events: Vec<EventView> = result.events.into_iter().map(EventView::from).collect();

    (
        StatusCode::OK,
        Json(json!({
            "events": events,
            "pagination": {
                "page": page,
                "limit": limit,
                "total": result.total,
                "pages": pages,
            }
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_first_page_of_fifty() {
        let (q, page, limit) = parse_events_params(&EventsParams::default()).unwrap();
        assert_eq!((page, limit), (1, 50));
        assert_eq!(q.skip, 0);
        assert!(q.status.is_none());
    }

    #[test]
    fn limit_is_capped_and_skip_follows_page() {
        let params = EventsParams {
            page: Some("3".into()),
            limit: Some("500".into()),
            ..Default::default()
        };
        let (q, page, limit) = parse_events_params(&params).unwrap();
        assert_eq!((page, limit), (3, 100));
        assert_eq!(q.skip, 200);
    }

    #[test]
    fn bad_values_are_all_reported() {
        let params = EventsParams {
            page: Some("0".into()),
            status: Some("DELIVERED".into()),
            alert_id: Some("nope".into()),
            date_from: Some("yesterday".into()),
            ..Default::default()
        };
        let details = parse_events_params(&params).unwrap_err();
        assert_eq!(details.len(), 4);
    }

    #[test]
    fn dates_become_millis() {
        let params = EventsParams {
            date_from: Some("2024-02-15T10:30:00Z".into()),
            date_to: Some("2024-02-15T11:00:00+00:00".into()),
            ..Default::default()
        };
        let (q, _, _) = parse_events_params(&params).unwrap();
        assert_eq!(q.triggered_from, Some(1_707_993_000_000));
        assert_eq!(q.triggered_to, Some(1_707_994_800_000));
    }
}
