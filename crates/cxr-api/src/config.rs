//! API configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use cxr_inference::ClassifierConfig;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Per-IP rate limit on /predict, requests per second
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Path to the ONNX model artifact
    pub model_path: PathBuf,
    /// ONNX Runtime intra-op threads
    pub model_intra_threads: Option<usize>,
    /// Start loading the model in the background at boot
    pub load_on_startup: bool,
    /// Delay before the startup load, so health checks answer first
    pub load_delay: Duration,
    /// Let /predict trigger a load when the model is unloaded
    pub auto_load_on_request: bool,
    /// Install the Prometheus recorder and expose /metrics
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8089,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_body_size: 10 * 1024 * 1024, // 10MB
            environment: "development".to_string(),
            model_path: ClassifierConfig::default().model_path,
            model_intra_threads: None,
            load_on_startup: true,
            load_delay: Duration::ZERO,
            auto_load_on_request: true,
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup; unset or unparsable keys
    /// fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let lookup: &dyn Fn(&str) -> Option<String> = &lookup;
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(default)
        };

        Self {
            host: lookup("API_HOST").unwrap_or(defaults.host),
            port: parsed(lookup, "PORT")
                .or_else(|| parsed(lookup, "API_PORT"))
                .unwrap_or(defaults.port),
            cors_origins: lookup("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: parsed(lookup, "RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            max_body_size: parsed(lookup, "MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: lookup("ENVIRONMENT").unwrap_or(defaults.environment),
            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            model_intra_threads: parsed(lookup, "MODEL_INTRA_THREADS"),
            load_on_startup: flag("MODEL_LOAD_ON_STARTUP", defaults.load_on_startup),
            load_delay: parsed(lookup, "MODEL_LOAD_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.load_delay),
            auto_load_on_request: flag("AUTO_LOAD_ON_REQUEST", defaults.auto_load_on_request),
            metrics_enabled: flag("METRICS_ENABLED", defaults.metrics_enabled),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    /// Classifier settings derived from this config.
    pub fn classifier(&self) -> ClassifierConfig {
        ClassifierConfig {
            model_path: self.model_path.clone(),
            intra_threads: self.model_intra_threads,
        }
    }
}

fn parsed<T: FromStr>(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ApiConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.port, 8089);
        assert_eq!(config.model_path, PathBuf::from("Model/classification_cnn.onnx"));
        assert!(config.load_on_startup);
        assert!(config.auto_load_on_request);
        assert!(!config.is_production());
    }

    #[test]
    fn test_port_prefers_platform_variable() {
        let config = config_from(&[("PORT", "9000"), ("API_PORT", "8000")]);
        assert_eq!(config.port, 9000);

        let config = config_from(&[("API_PORT", "8000")]);
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_model_settings() {
        let config = config_from(&[
            ("MODEL_PATH", "/models/cxr.onnx"),
            ("MODEL_INTRA_THREADS", "2"),
            ("MODEL_LOAD_ON_STARTUP", "false"),
            ("MODEL_LOAD_DELAY_MS", "3000"),
            ("AUTO_LOAD_ON_REQUEST", "0"),
        ]);
        let classifier = config.classifier();
        assert_eq!(classifier.model_path, PathBuf::from("/models/cxr.onnx"));
        assert_eq!(classifier.intra_threads, Some(2));
        assert!(!config.load_on_startup);
        assert_eq!(config.load_delay, Duration::from_secs(3));
        assert!(!config.auto_load_on_request);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[("PORT", "not-a-port"), ("RATE_LIMIT_RPS", "-3")]);
        assert_eq!(config.port, 8089);
        assert_eq!(config.rate_limit_rps, 10);
    }

    #[test]
    fn test_cors_origins_split() {
        let config = config_from(&[("CORS_ORIGINS", "https://a.example, https://b.example")]);
        assert_eq!(config.cors_origins, vec!["https://a.example", "https://b.example"]);
    }
}
