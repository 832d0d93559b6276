//! Prediction handler.

use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use cxr_inference::{preprocess, InferenceError};
use cxr_models::{ModelState, Prediction};
use serde::Serialize;
use tracing::{error, info};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Multipart field carrying the image.
const FILE_FIELD: &str = "file";

/// Prediction response.
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    #[serde(flatten)]
    pub prediction: Prediction,
    /// Original image dimensions, `WxH`
    pub image_size: String,
}

/// Classify an uploaded chest X-ray.
///
/// Rejected with 503 before the upload is read when the model is not ready.
/// An unloaded model starts loading here when auto-load is enabled.
pub async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<PredictionResponse>> {
    let model_state = state.model.state();
    if !model_state.is_ready() {
        metrics::record_prediction_rejected(model_state.as_str());
        if model_state == ModelState::Unloaded
            && state.config.auto_load_on_request
            && state.model.ensure_loading_started()
        {
            return Err(ApiError::load_started());
        }
        return Err(ApiError::not_ready(model_state));
    }

    let mut multipart =
        multipart.map_err(|e| ApiError::bad_request(format!("Expected a multipart upload: {}", e)))?;
    let upload = read_upload(&mut multipart).await?;

    let tensor = tokio::task::spawn_blocking(move || preprocess(&upload))
        .await
        .map_err(|e| ApiError::internal(format!("Preprocessing task failed: {}", e)))?
        .map_err(|e| {
            metrics::record_prediction_rejected("invalid_image");
            ApiError::from(e)
        })?;

    let image_size = tensor.image_size();
    info!(image_size = %image_size, "Processing image");

    let prediction = state.model.classify(tensor).await.map_err(|e| {
        if matches!(e, InferenceError::InferenceFailed(_)) {
            error!(error = %e, "Prediction failed");
        }
        ApiError::from(e)
    })?;

    metrics::record_prediction(prediction.diagnosis);
    info!(
        diagnosis = %prediction.diagnosis,
        confidence = prediction.confidence,
        "Prediction completed"
    );

    Ok(Json(PredictionResponse {
        prediction,
        image_size,
    }))
}

/// Read the image bytes from the `file` field, or from the first field that
/// carries a filename.
async fn read_upload(multipart: &mut Multipart) -> ApiResult<Bytes> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some(FILE_FIELD) || field.file_name().is_some() {
            return field.bytes().await.map_err(multipart_error);
        }
    }

    Err(ApiError::MissingFile(FILE_FIELD))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::bad_request(format!("Malformed multipart body: {}", err.body_text()))
    }
}
