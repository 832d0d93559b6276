//! Shared data models for the chest X-ray classifier.
//!
//! This crate provides Serde-serializable types for:
//! - The fixed diagnosis label table and its index order
//! - Prediction results mapped from the model output vector
//! - Model lifecycle state and status snapshots

pub mod diagnosis;
pub mod model_state;
pub mod prediction;

// Re-export common types
pub use diagnosis::{Diagnosis, DiagnosisParseError};
pub use model_state::{ModelState, ModelStatus};
pub use prediction::{Prediction, PredictionError};
