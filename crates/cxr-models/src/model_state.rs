//! Model lifecycle state.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the shared classifier.
///
/// `Unloaded -> Loading -> {Ready, Failed}`; `Ready -> Unloaded` on unload;
/// `Failed -> Loading` only on an explicit retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    /// No model in memory
    #[default]
    Unloaded,
    /// Background load in progress
    Loading,
    /// Model loaded and warmed up
    Ready,
    /// Last load attempt failed
    Failed,
}

impl ModelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelState::Unloaded => "unloaded",
            ModelState::Loading => "loading",
            ModelState::Ready => "ready",
            ModelState::Failed => "failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ModelState::Ready)
    }

    /// Numeric encoding for the state gauge.
    pub fn gauge_value(&self) -> f64 {
        match self {
            ModelState::Unloaded => 0.0,
            ModelState::Loading => 1.0,
            ModelState::Ready => 2.0,
            ModelState::Failed => 3.0,
        }
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time view of the model lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelStatus {
    pub state: ModelState,

    /// Error recorded by the last failed load
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the current state was entered
    pub since: DateTime<Utc>,

    /// Wall-clock duration of the load that produced the current model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_duration_ms: Option<u64>,
}

impl ModelStatus {
    fn at(state: ModelState) -> Self {
        Self {
            state,
            error: None,
            since: Utc::now(),
            load_duration_ms: None,
        }
    }

    pub fn unloaded() -> Self {
        Self::at(ModelState::Unloaded)
    }

    pub fn loading() -> Self {
        Self::at(ModelState::Loading)
    }

    pub fn ready(load_duration_ms: u64) -> Self {
        Self {
            load_duration_ms: Some(load_duration_ms),
            ..Self::at(ModelState::Ready)
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::at(ModelState::Failed)
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }
}

impl Default for ModelStatus {
    fn default() -> Self {
        Self::unloaded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serde() {
        assert_eq!(serde_json::to_string(&ModelState::Loading).unwrap(), "\"loading\"");
        let parsed: ModelState = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, ModelState::Failed);
    }

    #[test]
    fn test_status_constructors() {
        assert_eq!(ModelStatus::default().state, ModelState::Unloaded);
        assert!(ModelStatus::ready(1200).is_ready());
        assert_eq!(ModelStatus::ready(1200).load_duration_ms, Some(1200));

        let failed = ModelStatus::failed("file missing");
        assert_eq!(failed.state, ModelState::Failed);
        assert_eq!(failed.error.as_deref(), Some("file missing"));
    }

    #[test]
    fn test_error_omitted_unless_failed() {
        let json = serde_json::to_value(ModelStatus::loading()).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["state"], "loading");
    }
}
