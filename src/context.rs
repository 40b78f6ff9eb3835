//! Per-request context and the store that tracks in-flight requests.
//!
//! Every request gets a fresh [`RequestId`] when the context cleanup layer
//! registers it. The context lives in the [`ContextStore`] until that layer
//! clears it, which happens exactly once per request even when the handler
//! fails, panics or the request future is dropped.
//!
//! Handlers do not need the store: the cleanup layer also puts a
//! [`RequestScope`] into the request extensions, which can be taken as an
//! extractor:
//!
//! ```rust,ignore
//! async fn handler(scope: RequestScope) -> &'static str {
//!     scope.logf(format_args!("doing work"));
//!     "ok"
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::logger::ScopedLogger;

/// Identity of one in-flight request. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Mutable state for a single request.
///
/// The only attribute is the request's [`ScopedLogger`], attached by the
/// logging layer. Writes before a logger is attached are dropped and
/// reported as such.
#[derive(Debug, Default)]
pub struct RequestContext {
    logger: Mutex<Option<ScopedLogger>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<ScopedLogger>> {
        self.logger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach the request's logger. Returns `false` and leaves the existing
    /// logger in place if one is already attached.
    pub fn attach_logger(&self, logger: ScopedLogger) -> bool {
        let mut slot = self.slot();
        if slot.is_some() {
            return false;
        }
        *slot = Some(logger);
        true
    }

    pub fn has_logger(&self) -> bool {
        self.slot().is_some()
    }

    /// Detach the logger so it can be finished and flushed.
    pub fn take_logger(&self) -> Option<ScopedLogger> {
        self.slot().take()
    }

    /// Append a line to the request log. Returns whether a logger was attached.
    pub fn log(&self, line: impl Into<String>) -> bool {
        match self.slot().as_mut() {
            Some(logger) => {
                logger.write(line);
                true
            }
            None => false,
        }
    }

    /// Formatted variant of [`RequestContext::log`].
    pub fn logf(&self, args: fmt::Arguments<'_>) -> bool {
        match self.slot().as_mut() {
            Some(logger) => {
                logger.printf(args);
                true
            }
            None => false,
        }
    }
}

/// Concurrency-safe map from in-flight request to its context.
///
/// All operations take one mutex for the duration of the map access only;
/// request processing never runs under it.
#[derive(Clone, Default)]
pub struct ContextStore {
    contexts: Arc<Mutex<HashMap<RequestId, Arc<RequestContext>>>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<RequestId, Arc<RequestContext>>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an empty context for `id`.
    ///
    /// An existing entry for the same id is replaced by a fresh one.
    pub fn register(&self, id: RequestId) -> Arc<RequestContext> {
        let context = Arc::new(RequestContext::new());
        if self.map().insert(id, context.clone()).is_some() {
            warn!(request_id = %id, "Request context registered twice, replaced");
        }
        context
    }

    /// Get the context for `id`, creating an empty one if none exists.
    pub fn get(&self, id: RequestId) -> Arc<RequestContext> {
        self.map().entry(id).or_default().clone()
    }

    /// Get the context for `id` without creating it.
    pub fn try_get(&self, id: RequestId) -> Option<Arc<RequestContext>> {
        self.map().get(&id).cloned()
    }

    /// Remove the context for `id`. Returns whether an entry was removed.
    pub fn clear(&self, id: RequestId) -> bool {
        self.map().remove(&id).is_some()
    }

    /// Number of live contexts.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }
}

impl fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextStore")
            .field("live", &self.len())
            .finish()
    }
}

/// Handle to the current request's context, stored in request extensions.
#[derive(Debug, Clone)]
pub struct RequestScope {
    id: RequestId,
    context: Arc<RequestContext>,
}

impl RequestScope {
    pub fn new(id: RequestId, context: Arc<RequestContext>) -> Self {
        Self { id, context }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn context(&self) -> &Arc<RequestContext> {
        &self.context
    }
}

impl Deref for RequestScope {
    type Target = RequestContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

impl<S> FromRequestParts<S> for RequestScope
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestScope>()
            .cloned()
            .ok_or_else(|| AppError::Internal("request scope missing".to_string()))
    }
}
