//! Library entrypoint for PennyWatch.
//!
//! The alert evaluation engine lives in `services`; `stores` holds the storage
//! seams it runs against. Integration tests under `tests/` build the engine on
//! the in-memory store and drive the HTTP triggers through `routes::app`.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod models;
pub mod stores;

#[path = "middleware/auth.rs"]
pub mod auth;

pub mod services;

pub mod controllers;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub engine: Arc<services::AlertEngine>,
    pub events: Arc<dyn stores::NotificationStore>,
}
