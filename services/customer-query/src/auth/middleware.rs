//! Bearer authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, verifies it with the configured
//! [`TokenVerifier`], and inserts the resulting [`Principal`] into request
//! extensions. Requests without a usable token never reach the handler.
use crate::api::error::{ApiError, api_forbidden, api_unauthorized};
use crate::auth::{AuthError, Principal, TokenVerifier};
use crate::observability::RequestId;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

/// Reject the request unless it carries a bearer token the verifier accepts.
///
/// # Errors
/// - 401 when the header is missing, is not a bearer credential, or fails verification.
/// - 403 when the token was issued by someone other than the configured issuer.
pub async fn require_auth(
    State(verifier): State<Arc<dyn TokenVerifier>>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = request.extensions().get::<RequestId>().cloned();
    let Some(token) = bearer_token(request.headers()).map(str::to_string) else {
        tracing::warn!(request_id = ?request_id, "missing bearer token");
        return reject(&AuthError::MissingToken, request_id);
    };

    match verifier.verify(&token).await {
        Ok(principal) => {
            tracing::debug!(subject = %principal.subject, "bearer token accepted");
            request.extensions_mut().insert::<Principal>(principal);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(
                request_id = ?request_id,
                error = %err,
                "bearer token rejected"
            );
            reject(&err, request_id)
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn reject(err: &AuthError, request_id: Option<RequestId>) -> Response {
    let (api, challenge): (ApiError, &'static str) = if err.status() == StatusCode::FORBIDDEN {
        (api_forbidden("Forbidden"), r#"Bearer error="invalid_token""#)
    } else if matches!(err, AuthError::MissingToken) {
        (api_unauthorized("Unauthorized"), "Bearer")
    } else {
        (api_unauthorized("Unauthorized"), r#"Bearer error="invalid_token""#)
    };
    let api = match request_id {
        Some(id) => api.with_request_id(id.0),
        None => api,
    };
    let mut response = api.into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
    response
}
