//! day-service: the workload Trantor deploys by default.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Service banner |
//! | GET | `/health` | Liveness and readiness probe target |
//! | GET | `/info` | Host and environment details |

pub mod handlers;
pub mod settings;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

pub use settings::{Settings, SettingsError};

pub const SERVICE_NAME: &str = "Day";
pub const VERSION: &str = "1.0.0";

/// Shared state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
}

pub fn build_router(settings: Settings) -> Router {
    let state = AppState {
        settings: Arc::new(settings),
    };
    Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health))
        .route("/info", get(handlers::info))
        .with_state(state)
}
