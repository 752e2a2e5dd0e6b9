use super::error::ApiError;
use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;

#[derive(Deserialize)]
struct SecretQuery {
    secret: Option<String>,
}

/// Rejects any request whose `secret` query parameter does not match the
/// configured key. Runs before routing, so unknown paths are rejected too.
pub async fn require_secret(
    State(expected): State<Arc<str>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = Query::<SecretQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(query)| query.secret)
        .filter(|secret| !secret.is_empty())
        .ok_or(ApiError::MissingSecret)?;

    if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        tracing::warn!(path = %request.uri().path(), "rejected request with invalid secret");
        return Err(ApiError::InvalidSecret);
    }

    Ok(next.run(request).await)
}
