//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use convertr_core::Config;
use convertr_worker::Reaper;
use std::sync::Arc;

/// Validate config, start tracing, build state and background tasks, and
/// assemble the router.
///
/// The returned [`Reaper`] stops when dropped, so keep it for the lifetime
/// of the server.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router, Reaper)> {
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.is_production())
        .context("Failed to initialize telemetry")?;

    tracing::info!(environment = %config.environment, "Configuration loaded and validated");

    let state = services::initialize_services(&config).await?;
    let reaper = Reaper::spawn(
        state.worker.clone(),
        config.job_retention(),
        config.job_reap_interval(),
    );

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router, reaper))
}
