//! Axum HTTP API server for the chest X-ray classifier.
//!
//! This crate provides:
//! - Liveness, readiness and model status endpoints that answer while the
//!   model is still loading
//! - Multipart `/predict` backed by the shared [`cxr_inference::ModelManager`]
//! - Explicit unload/reload of the model
//! - Per-IP rate limiting, security headers and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
