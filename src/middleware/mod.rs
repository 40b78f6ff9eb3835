//! Request-lifecycle middleware.
//!
//! - **Recover**: maps failures to 404/500, installed twice
//! - **Client IP**: normalizes the client address behind proxies
//! - **Context cleanup**: registers the per-request context and always clears it
//! - **Scoped logger**: buffers the request's log lines and flushes them as a block
//! - **Pipeline**: composes all of the above in their fixed order
//!
//! # Architecture
//!
//! ```text
//! Request → Recover → Client IP → Cleanup → Logger → Recover → Dispatch
//!              ↓                                        ↓
//!        500 (machinery)                        404 / 500 (handler)
//! ```

pub mod cleanup;
pub mod ip;
pub mod pipeline;
pub mod recover;
pub mod scoped_log;

pub use cleanup::{ContextCleanupLayer, ContextLease};
pub use ip::{ClientAddr, ClientIpLayer, TrustedProxyConfig, UNKNOWN_CLIENT, resolve_client_addr};
pub use pipeline::{PipelineService, RequestPipeline};
pub use recover::{RecoverLayer, RecoverPosition};
pub use scoped_log::ScopedLogLayer;
