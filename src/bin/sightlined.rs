//! sightlined - detection streaming daemon
//!
//! This daemon:
//! 1. Accepts one streaming session per websocket connection
//! 2. Runs detection, suppression, and region aggregation per frame
//! 3. Streams annotated JPEG frames with per-region readouts
//! 4. Applies region/model reconfiguration mid-stream without interrupting
//! 5. Serves the model store listing for client selection controls

use std::sync::Arc;

use anyhow::{Context, Result};

use sightline::detect::BackendRegistry;
use sightline::server::{router, AppState};
use sightline::SightlineConfig;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = SightlineConfig::load()?;
    let registry = Arc::new(BackendRegistry::new(&cfg.model_dir));

    let models = registry.list_models();
    log::info!("model store at {} ({} models)", cfg.model_dir, models.len());
    if !models.iter().any(|model| model == &cfg.default_model) {
        log::warn!(
            "default model {} is not in the store; sessions must name one explicitly",
            cfg.default_model
        );
    }

    let state = AppState {
        registry,
        session_config: cfg.session_config(),
    };

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("bind {}", cfg.listen_addr))?;
    log::info!("sightlined listening on {}", cfg.listen_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {err}");
        return;
    }
    log::info!("shutdown signal received");
}
