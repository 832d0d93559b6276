//! Liveness handlers. These never touch the model lock.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use cxr_models::{Diagnosis, ModelState};
use serde::Serialize;

use crate::state::AppState;

/// Root info response.
#[derive(Serialize)]
pub struct RootResponse {
    pub status: String,
    pub message: String,
    pub model_status: ModelState,
    pub uptime: String,
    pub classes: Vec<&'static str>,
}

/// Root endpoint: service info, independent of model state.
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        status: "online".to_string(),
        message: "Chest X-ray Classification API is running".to_string(),
        model_status: state.model.state(),
        uptime: state.uptime_display(),
        classes: Diagnosis::labels(),
    })
}

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub model_status: ModelState,
    pub uptime: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe). Always 200 once the process is up.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: "API is running".to_string(),
        model_status: state.model.state(),
        uptime: state.uptime_display(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
