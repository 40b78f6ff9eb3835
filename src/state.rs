//! Shared application state for Axum handlers.
//!
//! Everything here is either immutable after startup or internally
//! synchronized, so the state is cloned freely into every request task:
//!
//! - **Configuration**: runtime configuration access
//! - **Templates**: the compiled page templates
//! - **Sunlight client**: shared HTTP connection pool to the Congress API
//! - **Context store / log sink**: the handles the request pipeline uses

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::context::ContextStore;
use crate::logger::LogSink;
use crate::sunlight::SunlightClient;
use crate::templates::Templates;

/// Shared application state for Axum handlers.
///
/// ```rust,ignore
/// let state = AppState::new(config, templates, sunlight, LogSink::stderr());
/// let app = build_router(state);
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    pub templates: Templates,
    pub sunlight: SunlightClient,
    /// In-flight request contexts
    pub contexts: ContextStore,
    /// Destination of per-request log blocks
    pub log_sink: LogSink,
    /// Timestamp when the application started
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        templates: Templates,
        sunlight: SunlightClient,
        log_sink: LogSink,
    ) -> Self {
        Self {
            config: Arc::new(config),
            templates,
            sunlight,
            contexts: ContextStore::new(),
            log_sink,
            started_at: Instant::now(),
        }
    }

    /// Get uptime in seconds since the state was created.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("roll_id", &self.config.roll_id)
            .field("sunlight", &self.sunlight.base_url())
            .field("contexts", &self.contexts)
            .finish_non_exhaustive()
    }
}
