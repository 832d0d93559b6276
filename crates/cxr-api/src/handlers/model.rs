//! Model lifecycle handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use cxr_models::{ModelState, ModelStatus};
use serde::Serialize;
use tracing::info;

use crate::state::AppState;

/// Model status response.
#[derive(Serialize)]
pub struct ModelStatusResponse {
    pub model_ready: bool,
    pub model_loaded: bool,
    pub model_loading: bool,
    #[serde(flatten)]
    pub status: ModelStatus,
    pub model_path: String,
    pub uptime: String,
}

impl ModelStatusResponse {
    fn from_state(state: &AppState) -> Self {
        let status = state.model.status();
        Self {
            model_ready: status.is_ready(),
            model_loaded: status.is_ready(),
            model_loading: status.state == ModelState::Loading,
            status,
            model_path: state.model.model_source(),
            uptime: state.uptime_display(),
        }
    }
}

/// Current lifecycle state. Never blocks and never fails.
pub async fn model_status(State(state): State<AppState>) -> Json<ModelStatusResponse> {
    Json(ModelStatusResponse::from_state(&state))
}

/// Readiness probe: 200 once the model is ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ModelStatusResponse>) {
    let response = ModelStatusResponse::from_state(&state);
    let code = if response.model_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}

/// Response for unload/reload actions.
#[derive(Serialize)]
pub struct ModelActionResponse {
    pub status: String,
    pub message: String,
    pub state: ModelState,
}

/// Release the model and reclaim its memory.
pub async fn unload_model(State(state): State<AppState>) -> Json<ModelActionResponse> {
    let released = state.model.unload().await;
    let message = if released {
        "Model unloaded from memory"
    } else {
        "Model was not loaded"
    };

    Json(ModelActionResponse {
        status: "success".to_string(),
        message: message.to_string(),
        state: state.model.state(),
    })
}

/// Start a load from `failed` or `unloaded`.
pub async fn reload_model(State(state): State<AppState>) -> (StatusCode, Json<ModelActionResponse>) {
    if state.model.retry() {
        info!("Model reload requested");
        return (
            StatusCode::ACCEPTED,
            Json(ModelActionResponse {
                status: "accepted".to_string(),
                message: "Model loading has started".to_string(),
                state: state.model.state(),
            }),
        );
    }

    let current = state.model.state();
    (
        StatusCode::OK,
        Json(ModelActionResponse {
            status: "unchanged".to_string(),
            message: format!("Model is already {}", current),
            state: current,
        }),
    )
}
