//! Application routing configuration with the request pipeline.
//!
//! # Route Groups
//!
//! - `/` - Index page for the configured roll
//! - `/static/js/*`, `/static/css/*` - Files under `STATIC_RESOURCES_PATH`
//! - anything else - 404 via [`handlers::not_found`]
//!
//! Static lookups that miss fall through to the same not-found handler, so
//! every 404 is produced (and logged) the same way.
//!
//! The [`RequestPipeline`] is applied last, after the routes and the
//! fallback, so it wraps all of them identically.

use axum::Router;
use axum::handler::HandlerWithoutStateExt;
use axum::routing::get;
use tower_http::services::ServeDir;
use tracing::info;

use crate::handlers;
use crate::middleware::{RequestPipeline, TrustedProxyConfig};
use crate::state::AppState;

/// Build the application router with all routes and the pipeline configured.
///
/// # Arguments
///
/// * `state` - Application state containing config, services and the
///   pipeline's shared handles
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    let trusted_proxies = TrustedProxyConfig::new(&config.trusted_proxies);
    if config.proxy_validation_enabled() {
        info!(
            proxies = ?config.trusted_proxies,
            "Forwarded headers honored only from trusted proxies"
        );
    }
    let pipeline = RequestPipeline::new(
        state.contexts.clone(),
        state.log_sink.clone(),
        trusted_proxies,
    );

    let static_root = &config.static_resources_path;
    let js = ServeDir::new(static_root.join("js"))
        .append_index_html_on_directories(false)
        .fallback(handlers::not_found.into_service());
    let css = ServeDir::new(static_root.join("css"))
        .append_index_html_on_directories(false)
        .fallback(handlers::not_found.into_service());

    Router::new()
        .route("/", get(handlers::index))
        .nest_service("/static/js", js)
        .nest_service("/static/css", css)
        .fallback(handlers::not_found)
        .layer(pipeline)
        .with_state(state)
}
