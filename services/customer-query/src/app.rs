//! HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Middleware order (outermost first)
//! request id -> trace span -> security headers -> panic catcher -> body limit
//! -> (customer routes only) bearer auth -> handler.
use crate::api;
use crate::api::error::{ApiError, api_internal_message, api_not_found};
use crate::api::openapi::ApiDoc;
use crate::auth::TokenVerifier;
use crate::auth::middleware::require_auth;
use crate::observability::{self, RequestId};
use crate::store::CustomerStore;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

const MAX_BODY_BYTES: usize = 100 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CustomerStore>,
    pub verifier: Arc<dyn TokenVerifier>,
}

const SECURITY_HEADERS: [(&str, &str); 8] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
    (
        "strict-transport-security",
        "max-age=15552000; includeSubDomains",
    ),
    ("content-security-policy", "default-src 'self'"),
    ("referrer-policy", "no-referrer"),
    ("x-dns-prefetch-control", "off"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
];

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .extensions()
                .get::<RequestId>()
                .map(|id| id.as_str().to_string())
                .unwrap_or_default();
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
                request_id = %request_id
            )
        });

    let customers = Router::new()
        .route("/customers/:rut", get(api::customers::get_customer))
        .route("/customers", post(api::customers::create_customer))
        .route_layer(axum::middleware::from_fn_with_state(
            state.verifier.clone(),
            require_auth,
        ));

    let router = Router::new()
        .route("/health", get(api::system::health))
        .route(
            "/openapi.json",
            get(|| async { axum::Json(ApiDoc::openapi()) }),
        )
        .merge(customers)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::custom(handle_panic));

    with_security_headers(router)
        .layer(trace_layer)
        .layer(axum::middleware::from_fn(observability::request_id))
        .with_state(state)
}

fn with_security_headers(router: Router<AppState>) -> Router<AppState> {
    SECURITY_HEADERS
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            ))
        })
}

async fn not_found(request_id: RequestId) -> ApiError {
    api_not_found("Not found").with_request_id(request_id.0)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "handler panicked");
    api_internal_message().into_response()
}
