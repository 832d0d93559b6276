//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cxr_inference::InferenceError;
use cxr_models::ModelState;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    ModelNotReady { state: ModelState, message: String },

    #[error("Invalid image file. {0}")]
    InvalidImage(String),

    #[error("No file uploaded; send the image in a multipart field named '{0}'")]
    MissingFile(&'static str),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Error processing the request: {0}")]
    InferenceFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Model not ready, with the message callers see for that state.
    pub fn not_ready(state: ModelState) -> Self {
        let message = match state {
            ModelState::Loading => "Model is still loading, please try again in a few seconds",
            ModelState::Failed => "Model failed to load, please check /model-status",
            ModelState::Unloaded => "Model is not loaded",
            ModelState::Ready => "Model is not ready yet, please try again in a few seconds",
        };
        Self::ModelNotReady {
            state,
            message: message.to_string(),
        }
    }

    /// Model not ready because this request just started a load.
    pub fn load_started() -> Self {
        Self::ModelNotReady {
            state: ModelState::Loading,
            message: "Model loading has started, please try again in a few seconds".to_string(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ModelNotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InvalidImage(_) | ApiError::MissingFile(_) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InferenceFailed(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::ModelNotReady { .. } => "model_not_ready",
            ApiError::InvalidImage(_) => "invalid_image",
            ApiError::MissingFile(_) => "missing_file",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::RateLimited => "rate_limited",
            ApiError::InferenceFailed(_) => "inference_failed",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<InferenceError> for ApiError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::ModelNotReady { state } => ApiError::not_ready(state),
            InferenceError::InvalidImage(msg) => ApiError::InvalidImage(msg),
            InferenceError::InferenceFailed(msg) => ApiError::InferenceFailed(msg),
            // Load errors are recorded in the model status, not raised by
            // request paths; reaching here means a bug in the caller.
            other @ (InferenceError::ModelNotFound(_) | InferenceError::ModelLoadFailed(_)) => {
                ApiError::Internal(other.to_string())
            }
        }
    }
}

/// Attached to 500 responses so their detail can be redacted in production.
#[derive(Debug, Clone, Copy)]
pub struct InternalErrorCode(pub &'static str);

impl InternalErrorCode {
    /// The same error with its detail replaced by a generic message.
    pub fn redacted(self) -> Response {
        let body = ErrorResponse {
            detail: "An internal error occurred".to_string(),
            code: self.0,
            state: None,
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<ModelState>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let state = match &self {
            ApiError::ModelNotReady { state, .. } => Some(*state),
            _ => None,
        };

        let body = ErrorResponse {
            detail: self.to_string(),
            code: self.code(),
            state,
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            response
                .extensions_mut()
                .insert(InternalErrorCode(self.code()));
        }
        if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::TOO_MANY_REQUESTS {
            response
                .headers_mut()
                .insert("Retry-After", axum::http::HeaderValue::from_static("5"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_errors_map_to_status() {
        let err: ApiError = InferenceError::not_ready(ModelState::Loading).into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().contains("loading"));

        let err: ApiError = InferenceError::invalid_image("Could not decode the image").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "invalid_image");

        let err: ApiError = InferenceError::inference_failed("boom").into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_ready_messages() {
        assert!(ApiError::not_ready(ModelState::Failed)
            .to_string()
            .contains("failed to load"));
        assert!(ApiError::load_started().to_string().contains("has started"));
    }

    #[test]
    fn test_internal_errors_are_marked_for_redaction() {
        let response = ApiError::InferenceFailed("session run failed".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let code = response.extensions().get::<InternalErrorCode>().copied();
        assert_eq!(code.map(|c| c.0), Some("inference_failed"));

        let response = ApiError::bad_request("nope").into_response();
        assert!(response.extensions().get::<InternalErrorCode>().is_none());
    }

    #[test]
    fn test_not_ready_sets_retry_after() {
        let response = ApiError::not_ready(ModelState::Loading).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()["Retry-After"], "5");
    }
}
