//! Application state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cxr_inference::{ModelLoader, ModelManager, OrtLoader};

use crate::config::ApiConfig;
use crate::middleware::PredictRateLimiter;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub model: ModelManager,
    pub rate_limiter: Arc<PredictRateLimiter>,
    pub started_at: Instant,
}

impl AppState {
    /// Create state backed by the ONNX model at `config.model_path`.
    /// The model is not loaded yet.
    pub fn new(config: ApiConfig) -> Self {
        let loader = OrtLoader::new(config.classifier());
        Self::with_loader(config, Arc::new(loader))
    }

    /// Create state with a custom model loader.
    pub fn with_loader(config: ApiConfig, loader: Arc<dyn ModelLoader>) -> Self {
        let rate_limiter = Arc::new(PredictRateLimiter::new(config.rate_limit_rps));
        Self {
            config,
            model: ModelManager::new(loader),
            rate_limiter,
            started_at: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Uptime formatted as seconds with two decimals, e.g. `12.34s`.
    pub fn uptime_display(&self) -> String {
        format!("{:.2}s", self.uptime().as_secs_f64())
    }
}
