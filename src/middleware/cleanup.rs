//! Registers a context for every request and guarantees its removal.
//!
//! Removal is tied to a drop guard owned by the response future, so it runs
//! on normal completion, on a panic unwinding through the future, and when
//! the future is dropped before completion (client went away).

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::trace;

use crate::context::{ContextStore, RequestId, RequestScope};
use crate::metrics;

/// Clears one context from the store when dropped.
pub struct ContextLease {
    store: ContextStore,
    id: RequestId,
}

impl ContextLease {
    /// Register a fresh context for `id` and return the guard plus the scope
    /// handle for request extensions.
    pub fn acquire(store: ContextStore, id: RequestId) -> (Self, RequestScope) {
        let context = store.register(id);
        metrics::set_active_requests(store.len());
        (Self { store, id }, RequestScope::new(id, context))
    }
}

impl Drop for ContextLease {
    fn drop(&mut self) {
        if !self.store.clear(self.id) {
            trace!(request_id = %self.id, "Context already cleared");
        }
        metrics::set_active_requests(self.store.len());
    }
}

#[derive(Clone)]
pub struct ContextCleanupLayer {
    store: ContextStore,
}

impl ContextCleanupLayer {
    pub fn new(store: ContextStore) -> Self {
        Self { store }
    }
}

impl<S> Layer<S> for ContextCleanupLayer {
    type Service = ContextCleanupService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ContextCleanupService {
            inner,
            store: self.store.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ContextCleanupService<S> {
    inner: S,
    store: ContextStore,
}

impl<S> Service<Request<Body>> for ContextCleanupService<S>
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

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let (lease, scope) = ContextLease::acquire(self.store.clone(), RequestId::new());
        req.extensions_mut().insert(scope);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let _lease = lease;
            inner.call(req).await
        })
    }
}
