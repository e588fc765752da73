//! Bearer token authentication.
//!
//! # Purpose
//! Verifies inbound JWTs against the configured OAuth issuer and exposes the
//! resulting [`Principal`] to handlers.
//!
//! # Key invariants
//! - A token from any issuer other than the configured one is forbidden, not
//!   merely unauthenticated.
//! - Every other verification failure is reported as unauthenticated.
use async_trait::async_trait;
use axum::http::StatusCode;

pub mod middleware;
pub mod oidc;
pub mod principal;

pub use principal::Principal;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("issuer not allowed")]
    IssuerNotAllowed,
    #[error("missing subject")]
    MissingSubject,
    #[error("missing key id")]
    MissingKeyId,
    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("invalid jwk: {0}")]
    InvalidJwk(String),
    #[error("jwks key not found")]
    JwksKeyNotFound,
    #[error("invalid claim: {0}")]
    InvalidClaim(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::IssuerNotAllowed => StatusCode::FORBIDDEN,
            AuthError::Jwt(err)
                if matches!(
                    err.kind(),
                    jsonwebtoken::errors::ErrorKind::InvalidIssuer
                ) =>
            {
                StatusCode::FORBIDDEN
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Verifies a raw bearer token and returns the caller identity.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError>;
}
