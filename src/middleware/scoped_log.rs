//! Attaches a [`ScopedLogger`] to each request and flushes it at the end.
//!
//! The logger is created when the request enters this layer, gets the
//! delimiter and the request line, and is handed to the request context so
//! dispatch (and the inner recovery layer) can append to it. When the inner
//! service returns, the `FINISHED IN` line is added and the block is written
//! to the [`LogSink`] in one piece.
//!
//! A failed sink write replaces the response with an unclassified failure,
//! which the outer recovery layer turns into a 500.
//!
//! If the request future is dropped before dispatch returns (client went
//! away), a [`PendingBlock`] guard still flushes whatever was logged so far,
//! closed with a `CANCELLED AFTER <elapsed>` line.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::{debug, error, trace};

use crate::context::{ContextStore, RequestContext, RequestId, RequestScope};
use crate::error::AppError;
use crate::logger::{BLOCK_DELIMITER, CANCELLED_PREFIX, LogSink, ScopedLogger};
use crate::metrics;
use crate::middleware::ip::ClientAddr;

/// Flushes a request's block if the request ends without reaching the
/// normal flush (its future was dropped).
pub struct PendingBlock {
    id: RequestId,
    context: Arc<RequestContext>,
    sink: LogSink,
}

impl PendingBlock {
    pub fn new(id: RequestId, context: Arc<RequestContext>, sink: LogSink) -> Self {
        Self { id, context, sink }
    }

    /// Detach the logger for the normal flush. After this the guard is inert.
    pub fn take(&self) -> Option<ScopedLogger> {
        self.context.take_logger()
    }
}

impl Drop for PendingBlock {
    fn drop(&mut self) {
        // Writing to a sink that panics while already unwinding would abort.
        if std::thread::panicking() {
            return;
        }
        let Some(mut logger) = self.context.take_logger() else {
            return;
        };
        let elapsed = logger.elapsed();
        logger.printf(format_args!("{CANCELLED_PREFIX} {elapsed:?}"));
        match logger.flush_to(&self.sink) {
            Ok(_) => debug!(request_id = %self.id, ?elapsed, "Request cancelled, log block flushed"),
            Err(e) => {
                error!(request_id = %self.id, error = %e, "Failed to flush cancelled request log block");
                metrics::record_log_flush_failure();
            }
        }
    }
}

#[derive(Clone)]
pub struct ScopedLogLayer {
    store: ContextStore,
    sink: LogSink,
}

impl ScopedLogLayer {
    pub fn new(store: ContextStore, sink: LogSink) -> Self {
        Self { store, sink }
    }
}

impl<S> Layer<S> for ScopedLogLayer {
    type Service = ScopedLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ScopedLogService {
            inner,
            store: self.store.clone(),
            sink: self.sink.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ScopedLogService<S> {
    inner: S,
    store: ContextStore,
    sink: LogSink,
}

impl<S> Service<Request<Body>> for ScopedLogService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future =
        Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let Some(scope) = req.extensions().get::<RequestScope>().cloned() else {
            let err = AppError::Internal("scoped logger installed without a request scope".into());
            return Box::pin(async move { Ok::<_, S::Error>(err.into_response()) });
        };
        let client = req
            .extensions()
            .get::<ClientAddr>()
            .cloned()
            .unwrap_or_else(ClientAddr::unknown);

        let context = self.store.get(scope.id());
        let mut logger = ScopedLogger::new();
        logger.write(BLOCK_DELIMITER);
        logger.printf(format_args!("[{}] {} {}", req.method(), client, req.uri()));
        context.attach_logger(logger);

        let sink = self.sink.clone();
        let pending = PendingBlock::new(scope.id(), context, sink.clone());
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = inner.call(req).await?;

            let Some(mut logger) = pending.take() else {
                let err = AppError::Internal("request logger detached before flush".into());
                return Ok(err.into_response());
            };
            let elapsed = logger.finish();
            metrics::record_request(response.status().as_u16(), elapsed);

            match logger.flush_to(&sink) {
                Ok(bytes) => {
                    trace!(request_id = %scope.id(), bytes, "Request log block flushed");
                    Ok(response)
                }
                Err(e) => {
                    error!(request_id = %scope.id(), error = %e, "Failed to flush request log block");
                    metrics::record_log_flush_failure();
                    Ok(AppError::LogSink(e).into_response())
                }
            }
        })
    }
}
