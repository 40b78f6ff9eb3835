//! # senatron
//!
//! Compares how the Senate voted on a roll call with how the population the
//! senators represent would have weighed in, served over Axum with a strict
//! per-request lifecycle:
//!
//! - **Request context**: every in-flight request owns a context that is
//!   registered on entry and always removed on exit
//! - **Scoped logging**: a request's log lines are buffered and written to
//!   the log sink as one contiguous block
//! - **Recovery**: handler errors and panics become a plain 404 or 500
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pipeline (Recover → Client IP → Cleanup → Logger → Recover)│
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (index, static files, not found)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Tally + Census          │  Templates (minijinja)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SunlightClient (Congress API over reqwest)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use senatron::{AppState, Config, LogSink, SunlightClient, Templates, build_router};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let templates = Templates::load(config.template_dir())?;
//! let sunlight = SunlightClient::from_config(&config)?;
//!
//! let state = AppState::new(config, templates, sunlight, LogSink::stderr());
//! let app = build_router(state);
//! // Serve with `into_make_service_with_connect_info::<SocketAddr>()`...
//! # Ok(())
//! # }
//! ```

pub mod census;
pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod logger;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod sunlight;
pub mod tally;
pub mod templates;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use context::{ContextStore, RequestContext, RequestId, RequestScope};
pub use error::{AppError, AppResult, Failure};
pub use logger::{LogSink, ScopedLogger};
pub use middleware::RequestPipeline;
pub use routes::build_router;
pub use state::AppState;
pub use sunlight::{SunlightClient, SunlightError, Vote};
pub use tally::VoteTally;
pub use templates::Templates;
