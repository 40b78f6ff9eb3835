//! The fixed middleware chain applied to every route.
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────────┐
//! │  Recover (outer)     │ ← 500 if the machinery below fails
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │  Client IP           │ ← ClientAddr extension
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │  Context cleanup     │ ← register / always clear
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │  Scoped logger       │ ← attach / flush block
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │  Recover (inner)     │ ← 404 / 500 for dispatch failures
//! └──────────┬───────────┘
//!            ▼
//!        Dispatch
//! ```
//!
//! The pipeline is built once and cloned into the router; it holds only
//! shared handles (store, sink, proxy config), never per-request state.

use std::sync::Arc;

use tower::{Layer, ServiceBuilder};

use super::cleanup::{ContextCleanupLayer, ContextCleanupService};
use super::ip::{ClientIpLayer, ClientIpService, TrustedProxyConfig};
use super::recover::{RecoverLayer, RecoverService};
use super::scoped_log::{ScopedLogLayer, ScopedLogService};
use crate::context::ContextStore;
use crate::logger::LogSink;

/// Service produced by wrapping a terminal handler `S` in the pipeline.
pub type PipelineService<S> = RecoverService<
    ClientIpService<ContextCleanupService<ScopedLogService<RecoverService<S>>>>,
>;

/// Request-lifecycle middleware chain.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RequestPipeline::new(store, sink, trusted_proxies);
/// let app = Router::new()
///     .route("/", get(handlers::index))
///     .fallback(handlers::not_found)
///     .layer(pipeline);
/// ```
#[derive(Clone)]
pub struct RequestPipeline {
    store: ContextStore,
    sink: LogSink,
    trusted_proxies: Arc<TrustedProxyConfig>,
}

impl RequestPipeline {
    pub fn new(store: ContextStore, sink: LogSink, trusted_proxies: TrustedProxyConfig) -> Self {
        Self {
            store,
            sink,
            trusted_proxies: Arc::new(trusted_proxies),
        }
    }

    /// Wrap a terminal handler.
    pub fn then<S>(&self, terminal: S) -> PipelineService<S> {
        self.layer(terminal)
    }
}

impl<S> Layer<S> for RequestPipeline {
    type Service = PipelineService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        // Outermost first.
        ServiceBuilder::new()
            .layer(RecoverLayer::outer())
            .layer(ClientIpLayer::new(self.trusted_proxies.clone()))
            .layer(ContextCleanupLayer::new(self.store.clone()))
            .layer(ScopedLogLayer::new(self.store.clone(), self.sink.clone()))
            .layer(RecoverLayer::inner())
            .service(inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::convert::Infallible;
    use std::io::{self, Write};
    use std::sync::Mutex;

    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode};
    use tower::ServiceExt;
    use tower::service_fn;

    use super::*;
    use crate::context::RequestScope;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_layers_run_in_order_around_terminal() {
        let buffer = Buffer::default();
        let store = ContextStore::new();
        let pipeline = RequestPipeline::new(
            store.clone(),
            LogSink::from_writer(buffer.clone()),
            TrustedProxyConfig::default(),
        );

        let svc = pipeline.then(service_fn(|req: Request<Body>| async move {
            let scope = req.extensions().get::<RequestScope>().unwrap();
            assert!(scope.has_logger(), "logger must be attached before dispatch");
            scope.log("inside dispatch");
            Ok::<_, Infallible>(Response::new(Body::empty()))
        }));

        let response = svc
            .oneshot(Request::builder().uri("/x").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(store.is_empty());

        let log = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.first(), Some(&"===="));
        assert_eq!(lines.get(1), Some(&"[GET] unknown /x"));
        assert_eq!(lines.get(2), Some(&"inside dispatch"));
        assert!(lines.get(3).unwrap().starts_with("FINISHED IN"));
        assert_eq!(lines.len(), 4);
    }
}
