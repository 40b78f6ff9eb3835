//! Error recovery: turns abnormal termination into an HTTP response.
//!
//! The layer is installed twice in the pipeline:
//!
//! - **Inner**, right above dispatch. Handler errors and handler panics are
//!   converted here, and unclassified ones are written to the request's
//!   scoped logger as `PANIC: <description>` so they land in the request block.
//! - **Outer**, above everything else. It only sees failures from the
//!   pipeline machinery itself (a log sink that fails to write, a panic in a
//!   layer). Those requests may have no logger, or a broken one, so the outer
//!   layer never touches it and reports through `tracing` instead.
//!
//! Abnormal termination is either a response carrying a [`Failure`]
//! extension (typed errors, see [`AppError`](crate::error::AppError)) or a
//! panic, caught with `catch_unwind`.

use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use futures::FutureExt;
use tower::{Layer, Service};
use tracing::error;

use crate::context::RequestScope;
use crate::error::Failure;
use crate::metrics;

/// Where in the pipeline a recovery layer sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverPosition {
    Outer,
    Inner,
}

impl RecoverPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            RecoverPosition::Outer => "outer",
            RecoverPosition::Inner => "inner",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecoverLayer {
    position: RecoverPosition,
}

impl RecoverLayer {
    /// Last-resort layer wrapping the whole pipeline.
    pub fn outer() -> Self {
        Self {
            position: RecoverPosition::Outer,
        }
    }

    /// Layer directly around dispatch.
    pub fn inner() -> Self {
        Self {
            position: RecoverPosition::Inner,
        }
    }
}

impl<S> Layer<S> for RecoverLayer {
    type Service = RecoverService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoverService {
            inner,
            position: self.position,
        }
    }
}

#[derive(Clone)]
pub struct RecoverService<S> {
    inner: S,
    position: RecoverPosition,
}

impl<S> Service<Request<Body>> for RecoverService<S>
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
        let position = self.position;
        let scope = match position {
            RecoverPosition::Inner => req.extensions().get::<RequestScope>().cloned(),
            RecoverPosition::Outer => None,
        };
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // The inner call runs inside the guarded future so that a panic in
            // `call` itself is caught too.
            let outcome = AssertUnwindSafe(async move { inner.call(req).await })
                .catch_unwind()
                .await;

            let failure = match outcome {
                Ok(Ok(response)) => match response.extensions().get::<Failure>() {
                    Some(failure) => failure.clone(),
                    None => return Ok(response),
                },
                Ok(Err(err)) => return Err(err),
                Err(payload) => Failure::from_panic(payload.as_ref()),
            };

            Ok(recover(position, scope.as_ref(), &failure))
        })
    }
}

/// Log `failure` as appropriate for `position` and build the final response.
fn recover(
    position: RecoverPosition,
    scope: Option<&RequestScope>,
    failure: &Failure,
) -> Response<Body> {
    metrics::record_recovered_failure(failure.kind(), position.as_str());

    if let Failure::Unclassified(description) = failure {
        let logged = scope.is_some_and(|scope| scope.logf(format_args!("PANIC: {description}")));
        if !logged {
            error!(layer = position.as_str(), "PANIC: {description}");
        }
    }

    failure.fixed_response()
}
