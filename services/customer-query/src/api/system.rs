//! Health endpoint.
//!
//! # Key invariants and assumptions
//! - Health checks must be fast and side-effect free.
//! - The endpoint is unauthenticated and reports liveness only; it does not
//!   probe the database, so a database outage never restarts the process.
use crate::api::types::HealthStatus;
use axum::Json;

#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is up", body = HealthStatus)
    )
)]
pub(crate) async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
    })
}
