//! Route configuration and middleware stack

use crate::handlers::{convert, download, events, formats, health, jobs, upload};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use convertr_core::constants::API_PREFIX;
use convertr_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Every endpoint, mounted under `/api`, with CORS, tracing and body limits applied
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config)?;

    let api = Router::new()
        .route("/upload", post(upload::upload_files))
        .route("/convert", post(convert::convert))
        .route("/convert-batch", post(convert::convert_batch))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs/{id}/events", get(events::job_events))
        .route("/conversion-jobs", get(jobs::list_jobs))
        .route("/download/{id}", get(download::download))
        .route("/supported-formats/{source}", get(formats::supported_formats))
        .route("/health", get(health::health_check));

    let router = Router::new()
        .nest(API_PREFIX, api)
        .layer(ConcurrencyLimitLayer::new(config.http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(config.max_request_body_bytes()))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!(
        prefix = API_PREFIX,
        max_body_bytes = config.max_request_body_bytes(),
        http_concurrency_limit = config.http_concurrency_limit,
        "Routes configured"
    );

    Ok(router)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    let cors = if config.cors_origins.iter().any(|origin| origin == "*") {
        if config.is_production() {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        tracing::warn!("CORS configured to allow all origins");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|origin| {
                origin
                    .parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", origin, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };

    Ok(cors)
}
