use axum::Json;
use axum::extract::State;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::{AppState, SERVICE_NAME, VERSION};

#[derive(Debug, Serialize)]
pub struct Home {
    pub service: &'static str,
    pub message: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct Info {
    pub service: &'static str,
    pub version: &'static str,
    pub hostname: String,
    pub environment: String,
    pub namespace: String,
    pub timestamp: String,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// GET /
pub async fn home() -> Json<Home> {
    Json(Home {
        service: SERVICE_NAME,
        message: "Welcome to the Day service",
        version: VERSION,
    })
}

/// GET /health
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "healthy",
        service: SERVICE_NAME,
        timestamp: now(),
    })
}

/// GET /info
pub async fn info(State(state): State<AppState>) -> Json<Info> {
    let s = &state.settings;
    Json(Info {
        service: SERVICE_NAME,
        version: VERSION,
        hostname: s.hostname.clone(),
        environment: s.environment.clone(),
        namespace: s.namespace.clone(),
        timestamp: now(),
    })
}
