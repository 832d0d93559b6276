//! Axum API server binary.

use std::net::SocketAddr;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cxr_api::{create_router, metrics, ApiConfig, AppState};
use cxr_models::ModelState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cxr_api=info,cxr_inference=info,tower_http=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting cxr-api");

    let config = ApiConfig::from_env();
    info!(
        host = %config.host,
        port = config.port,
        model_path = %config.model_path.display(),
        environment = %config.environment,
        "API config loaded"
    );

    // Install the recorder before any component records a metric
    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!(error = %e, "Failed to install metrics recorder, continuing without /metrics");
                None
            }
        }
    } else {
        None
    };

    let state = AppState::new(config.clone());
    let app = create_router(state.clone(), metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    // Load after the listener is bound so probes answer during startup
    if config.load_on_startup {
        let model = state.model.clone();
        let delay = config.load_delay;
        tokio::spawn(async move {
            if !delay.is_zero() {
                info!(delay_ms = delay.as_millis() as u64, "Delaying model load");
                tokio::time::sleep(delay).await;
            }
            model.ensure_loading_started();
            let status = model.wait_until_settled().await;
            match status.state {
                ModelState::Ready => info!(
                    load_duration_ms = status.load_duration_ms,
                    "Model ready for predictions"
                ),
                ModelState::Failed => error!(
                    error = status.error.as_deref().unwrap_or("unknown"),
                    "Model failed to load; retry with POST /reload-model"
                ),
                other => info!(state = %other, "Model load did not complete"),
            }
        });
    } else {
        info!("Model load on startup disabled; the model loads on first request");
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    state.model.unload().await;
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Received shutdown signal");
}
