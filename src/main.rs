use std::net::SocketAddr;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use senatron::{AppState, Config, LogSink, SunlightClient, Templates, build_router, metrics, utils};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting senatron v{}", env!("CARGO_PKG_VERSION"));

    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Run the application, returning an exit code on error.
async fn run() -> Result<(), exitcode::ExitCode> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {e}");
        exitcode::CONFIG
    })?;
    info!(
        host = %config.host,
        port = %config.port,
        static_resources = %config.static_resources_path.display(),
        roll_id = %config.roll_id,
        "Configuration loaded"
    );

    // Request log sink
    let log_sink = match &config.log_file_path {
        Some(path) => LogSink::create(path).map_err(|e| {
            error!("Failed to open log file {}: {e}", path.display());
            exitcode::CANTCREAT
        })?,
        None => LogSink::stderr(),
    };

    let templates = Templates::load(config.template_dir()).map_err(|e| {
        error!("Failed to load templates: {e}");
        exitcode::NOINPUT
    })?;

    let sunlight = SunlightClient::from_config(&config).map_err(|e| {
        error!("Failed to build Sunlight client: {e}");
        exitcode::SOFTWARE
    })?;

    if let Some(metrics_addr) = config.metrics_addr() {
        metrics::try_init_metrics(metrics_addr);
    }

    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;

    let state = AppState::new(config, templates, sunlight, log_sink);
    let app = build_router(state.clone());

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Server listening on http://{addr}");
    info!("Routes:");
    info!("  GET  /                 - Roll {}", state.config.roll_id);
    info!("  GET  /static/js/*      - Scripts");
    info!("  GET  /static/css/*     - Stylesheets");

    // Start server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(utils::shutdown_signal())
    .await
    .map_err(|e| {
        error!("Server error: {e}");
        exitcode::SOFTWARE
    })?;

    info!(
        uptime_secs = state.uptime_seconds(),
        in_flight = state.contexts.len(),
        "Server shutdown complete"
    );
    Ok(())
}
