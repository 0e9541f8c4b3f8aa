use crate::error::{AppError, ValidationError};
use crate::payments::utils::secure_eq;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::warn;

/// Header names are case-insensitive; `HeaderName::from_static` needs lowercase
pub const ADMIN_KEY_HEADER: &str = "x-admin-api-key";

/// Rejects dashboard requests that do not carry the configured admin key
pub async fn require_admin_api_key(
    State(expected): State<Arc<String>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if provided.is_empty() || !secure_eq(provided.as_bytes(), expected.as_bytes()) {
        warn!(path = %request.uri().path(), "Rejected dashboard request without valid admin key");
        return AppError::validation(ValidationError::Unauthorized).into_response();
    }

    next.run(request).await
}
