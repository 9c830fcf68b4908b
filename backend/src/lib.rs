//! Deep Research Backend Library
//!
//! This library exposes modules for testing and external use.
//! The main binary is in `src/main.rs`.

pub mod api;
pub mod config;
pub mod error;
pub mod research;
/// Application state management
///
/// Holds configuration, research services and the active session.
pub mod state;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use state::SharedState;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    message: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        message: "Backend is healthy".to_string(),
    })
}

/// Build the API router over `state`
///
/// Middleware layers are added by the binary.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        // Interactive research
        .route("/api/research/session", post(api::research::start_session))
        .route("/api/research/answer", post(api::research::submit_answer))
        .route("/api/research/run", post(api::research::run_session))
        // One-shot research
        .route("/api/research", post(api::research::research))
        // Settings
        .route(
            "/api/config",
            get(api::research::get_config).post(api::research::update_config),
        )
        .with_state(state)
}
