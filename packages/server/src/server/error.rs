//! Request-path error taxonomy.
//!
//! Background-stage errors never appear here: they are contained inside the
//! stage executor and observable only through the post's status on the next
//! poll. Everything below is surfaced synchronously to the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::kernel::DispatchError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or empty required fields on create/edit.
    #[error("{0}")]
    InvalidInput(String),

    /// Owner identity header absent. Token verification happens upstream;
    /// this layer only requires the identity to be present.
    #[error("missing x-user-id header")]
    Unauthenticated,

    /// Unifies missing record and ownership mismatch: one shape for both, so
    /// a caller can never confirm the existence of another owner's post.
    #[error("Post not found")]
    NotFound,

    /// The post exists but is not in a state that permits the operation,
    /// or a stage is already in flight for it.
    #[error("{0}")]
    Conflict(String),

    /// Collaborator credentials missing at startup; reads still work.
    #[error("content generation is currently disabled")]
    StageDisabled,

    /// A synchronous collaborator delegation (analyze/rewrite) failed.
    #[error("external content service failed")]
    Upstream(#[source] anyhow::Error),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::StageDisabled => ApiError::StageDisabled,
            DispatchError::StageInFlight(_) => ApiError::Conflict(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::StageDisabled => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ApiError::Upstream(source) => {
                tracing::warn!(error = %source, "collaborator call failed");
                (StatusCode::BAD_GATEWAY, format!("{}: {}", self, source))
            }
            ApiError::Internal(source) => {
                tracing::error!(error = %source, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_has_one_shape() {
        // The same variant serves missing records and foreign-owner access;
        // there is nothing else to vary.
        assert_eq!(ApiError::NotFound.to_string(), "Post not found");
    }

    #[test]
    fn dispatch_errors_map_to_api_errors() {
        assert!(matches!(
            ApiError::from(DispatchError::StageDisabled),
            ApiError::StageDisabled
        ));
        assert!(matches!(
            ApiError::from(DispatchError::StageInFlight(7)),
            ApiError::Conflict(_)
        ));
    }
}
