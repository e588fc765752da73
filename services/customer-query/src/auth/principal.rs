//! Verified caller identity.
//!
//! # Purpose
//! Carries the issuer and subject of a validated bearer token from the auth
//! middleware to handlers via request extensions.
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, api_unauthorized};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub issuer: String,
    pub subject: String,
}

/// Extracts the principal inserted by [`crate::auth::middleware::require_auth`].
///
/// Rejects with 401 when the middleware did not run for this route.
#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| api_unauthorized("Unauthorized"))
    }
}
