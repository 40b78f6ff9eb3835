use std::any::Any;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, HeaderValue};
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use thiserror::Error;

use crate::sunlight::SunlightError;

/// Body sent with every 404 produced by the request pipeline.
pub const NOT_FOUND_BODY: &str = "404 - Not Found";

/// Body sent with every 500 produced by the request pipeline.
pub const INTERNAL_ERROR_BODY: &str = "500 - Internal Server Error";

/// Application-wide error types.
///
/// Handlers return these instead of panicking. Every variant is mapped to a
/// [`Failure`] classification when converted into a response; only
/// [`AppError::NotFound`] is classified as not-found, everything else is
/// unclassified and ends up as a 500.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Vote lookup failed: {0}")]
    Upstream(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Log sink write failed: {0}")]
    LogSink(#[source] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<SunlightError> for AppError {
    fn from(err: SunlightError) -> Self {
        match err {
            SunlightError::VoteNotFound(roll_id) => {
                AppError::NotFound(format!("no vote with roll id {roll_id}"))
            }
            other => AppError::Upstream(other.to_string()),
        }
    }
}

/// Classification of an abnormal termination, carried in response extensions
/// until a recovery layer turns it into the final response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Maps to 404 and is never logged as a panic.
    NotFound,
    /// Anything else, with a human-readable description.
    Unclassified(String),
}

impl Failure {
    /// Build a classification from a caught panic payload.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let description = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Failure::Unclassified(description)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Failure::NotFound => StatusCode::NOT_FOUND,
            Failure::Unclassified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Failure::NotFound)
    }

    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Failure::NotFound => "not_found",
            Failure::Unclassified(_) => "unclassified",
        }
    }

    /// The fixed response for this classification, without the marker.
    pub fn fixed_response(&self) -> Response<Body> {
        let body = match self {
            Failure::NotFound => NOT_FOUND_BODY,
            Failure::Unclassified(_) => INTERNAL_ERROR_BODY,
        };
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = self.status();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }

    /// The fixed response with this classification attached, so that an
    /// enclosing recovery layer can still see it.
    pub fn marked_response(self) -> Response<Body> {
        let mut response = self.fixed_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::NotFound => f.write_str("not found"),
            Failure::Unclassified(description) => f.write_str(description),
        }
    }
}

impl From<&AppError> for Failure {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::NotFound(_) => Failure::NotFound,
            other => Failure::Unclassified(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // Logging happens in the recovery layer, which knows the request logger.
        tracing::debug!(error = %self, "Handler returned an error");
        Failure::from(&self).marked_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
