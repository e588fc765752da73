//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction to keep error shapes uniform
//! across customer endpoints and the auth middleware.
//!
//! # Key invariants and assumptions
//! - Error responses carry a human-readable `message` (the client contract), a
//!   stable `code`, and the request id when one is known.
//! - Status codes must align with the error category.
//!
//! # Security considerations
//! - Internal errors log details server-side but always return the same generic message.
use crate::api::types::ErrorResponse;
use crate::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Structured API error returned by handlers.
///
/// # Invariants
/// - `status` must match the semantics of `body.code`.
///
/// # Example
/// ```rust
/// use axum::http::StatusCode;
/// use customer_query::api::error::api_not_found;
///
/// let err = api_not_found("Customer not found").with_request_id("req-1");
/// assert_eq!(err.status, StatusCode::NOT_FOUND);
/// assert_eq!(err.body.request_id.as_deref(), Some("req-1"));
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: &str) -> Self {
        Self {
            status,
            body: ErrorResponse {
                message: message.to_string(),
                code: code.to_string(),
                request_id: None,
            },
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.body.request_id = Some(request_id.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// 400: the request itself is malformed (bad RUT, unparseable body).
pub fn api_validation_error(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "validation_error", message)
}

/// 422: well-formed request missing required fields.
pub fn api_unprocessable(message: &str) -> ApiError {
    ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "missing_fields", message)
}

pub fn api_not_found(message: &str) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "not_found", message)
}

pub fn api_unauthorized(message: &str) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

pub fn api_forbidden(message: &str) -> ApiError {
    ApiError::new(StatusCode::FORBIDDEN, "forbidden", message)
}

/// Build a 500 from a store error.
///
/// Logs `context` and the error; the client only ever sees
/// [`INTERNAL_ERROR_MESSAGE`].
pub fn api_internal(context: &str, err: &StoreError) -> ApiError {
    tracing::error!(error = ?err, "{context}");
    api_internal_message()
}

/// Build a 500 with nothing further to log.
pub fn api_internal_message() -> ApiError {
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        INTERNAL_ERROR_MESSAGE,
    )
}
