//! Error types for model loading and inference.

use cxr_models::ModelState;
use thiserror::Error;

/// Result type for inference operations.
pub type InferenceResult<T> = Result<T, InferenceError>;

/// Errors that can occur while loading or running the classifier.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    /// The model is loading, unloaded or failed; callers should retry later.
    #[error("Model is not ready (state: {state})")]
    ModelNotReady { state: ModelState },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),
}

impl InferenceError {
    pub fn not_ready(state: ModelState) -> Self {
        Self::ModelNotReady { state }
    }

    pub fn invalid_image(message: impl Into<String>) -> Self {
        Self::InvalidImage(message.into())
    }

    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    pub fn load_failed(message: impl Into<String>) -> Self {
        Self::ModelLoadFailed(message.into())
    }

    pub fn inference_failed(message: impl Into<String>) -> Self {
        Self::InferenceFailed(message.into())
    }
}
