//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model_fingerprint: String,
    active_sessions: usize,
    timestamp: i64,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model_fingerprint: state.model.info().fingerprint,
        active_sessions: state.sessions.len(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}
