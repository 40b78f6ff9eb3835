//! Fallback handlers.

use axum::http::Uri;

use crate::error::AppError;

/// Terminal handler for anything no route claimed.
///
/// Returns a not-found failure; the inner recovery layer turns it into the
/// plain 404 response without logging it as a panic.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
