//! Owner identity extraction.
//!
//! Token verification is handled upstream of this service; by the time a
//! request arrives the verified identity is carried in the `x-user-id`
//! header. Every post operation is scoped by it.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::error::ApiError;

/// The authenticated owner identity for the current request.
#[derive(Debug, Clone)]
pub struct OwnerId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| OwnerId(s.to_string()))
            .ok_or(ApiError::Unauthenticated)
    }
}
