//! Customer lookup and upsert handlers.
//!
//! # Purpose and responsibility
//! Validates the RUT, talks to the customer store, and records an audit event
//! for every successful write.
//!
//! # Key invariants and assumptions
//! - No store call happens for a request that fails validation.
//! - Responses always carry the normalized RUT.
//! - The upsert strictly precedes the audit insert and nothing wraps them in a
//!   transaction: if the insert fails the customer stays written and the caller
//!   gets a 500.
//!
//! # Security considerations
//! - Only reachable behind [`crate::auth::middleware::require_auth`].
//! - The raw RUT is logged only when it fails validation.
use crate::api::error::{
    ApiError, api_internal, api_not_found, api_unprocessable, api_validation_error,
};
use crate::api::types::{CustomerCreateRequest, CustomerStoredResponse, ErrorResponse};
use crate::app::AppState;
use crate::auth::Principal;
use crate::model::{Customer, NewCustomerEvent};
use crate::observability::RequestId;
use crate::rut;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::json;

const INVALID_RUT: &str = "Invalid RUT";
const INVALID_BODY: &str = "Invalid request body";
const NAMES_REQUIRED: &str = "firstName and lastName are required";
const NOT_FOUND: &str = "Customer not found";
const STORED: &str = "Customer stored";

fn record_lookup(outcome: &'static str) {
    metrics::counter!("customer_lookups_total", "outcome" => outcome).increment(1);
}

fn record_write(outcome: &'static str) {
    metrics::counter!("customer_writes_total", "outcome" => outcome).increment(1);
}

#[utoipa::path(
    get,
    path = "/customers/{rut}",
    tag = "customers",
    params(("rut" = String, Path, description = "Customer RUT, with or without periods")),
    responses(
        (status = 200, description = "Customer found", body = Customer),
        (status = 400, description = "Malformed RUT or bad check digit", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 403, description = "Token from another issuer", body = ErrorResponse),
        (status = 404, description = "No customer with this RUT", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
/// Look up a customer by RUT.
///
/// # Errors
/// - 400 when the RUT fails validation.
/// - 404 when no customer is stored under the normalized RUT.
/// - 500 when the store fails.
pub(crate) async fn get_customer(
    State(state): State<AppState>,
    request_id: RequestId,
    principal: Principal,
    Path(raw_rut): Path<String>,
) -> Result<Json<Customer>, ApiError> {
    if !rut::is_valid(&raw_rut) {
        tracing::warn!(request_id = %request_id, rut = %raw_rut, "invalid rut on lookup");
        record_lookup("invalid");
        return Err(api_validation_error(INVALID_RUT).with_request_id(request_id.0));
    }
    let normalized = rut::normalize(&raw_rut);
    tracing::info!(
        request_id = %request_id,
        rut = %normalized,
        subject = %principal.subject,
        "customer lookup"
    );

    let found = state.store.find_by_rut(&normalized).await.map_err(|err| {
        record_lookup("error");
        api_internal("failed to look up customer", &err).with_request_id(request_id.as_str())
    })?;
    match found {
        Some(customer) => {
            record_lookup("found");
            Ok(Json(customer))
        }
        None => {
            record_lookup("not_found");
            Err(api_not_found(NOT_FOUND).with_request_id(request_id.0))
        }
    }
}

#[utoipa::path(
    post,
    path = "/customers",
    tag = "customers",
    request_body = CustomerCreateRequest,
    responses(
        (status = 201, description = "Customer stored", body = CustomerStoredResponse),
        (status = 400, description = "Malformed body or invalid RUT", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 403, description = "Token from another issuer", body = ErrorResponse),
        (status = 422, description = "Missing firstName or lastName", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
/// Create or update a customer and append an audit event.
///
/// # Errors
/// - 400 when the body is malformed JSON or the RUT is missing or invalid.
///   A body sent without a JSON content type counts as empty.
/// - 422 when either name is missing or empty.
/// - 500 when the upsert or the audit insert fails.
pub(crate) async fn create_customer(
    State(state): State<AppState>,
    request_id: RequestId,
    principal: Principal,
    body: Result<Json<CustomerCreateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CustomerStoredResponse>), ApiError> {
    let Json(body) = body.map_err(|rejection| {
        tracing::warn!(request_id = %request_id, error = %rejection, "unreadable customer body");
        record_write("invalid");
        // A non-JSON content type is read as an empty body, which has no rut.
        let message = match rejection {
            JsonRejection::MissingJsonContentType(_) => INVALID_RUT,
            _ => INVALID_BODY,
        };
        api_validation_error(message).with_request_id(request_id.as_str())
    })?;

    let Some(raw_rut) = body.rut.as_deref().filter(|value| rut::is_valid(value)) else {
        tracing::warn!(
            request_id = %request_id,
            rut = body.rut.as_deref().unwrap_or_default(),
            "invalid rut on write"
        );
        record_write("invalid");
        return Err(api_validation_error(INVALID_RUT).with_request_id(request_id.0));
    };
    let (Some(first_name), Some(last_name)) = (
        body.first_name.as_deref().filter(|name| !name.is_empty()),
        body.last_name.as_deref().filter(|name| !name.is_empty()),
    ) else {
        record_write("invalid");
        return Err(api_unprocessable(NAMES_REQUIRED).with_request_id(request_id.0));
    };

    let normalized = rut::normalize(raw_rut);
    tracing::info!(
        request_id = %request_id,
        rut = %normalized,
        subject = %principal.subject,
        "customer upsert"
    );

    let customer = state
        .store
        .upsert(&normalized, first_name, last_name)
        .await
        .map_err(|err| {
            record_write("error");
            api_internal("failed to upsert customer", &err).with_request_id(request_id.as_str())
        })?;

    let event = NewCustomerEvent {
        rut: normalized.clone(),
        payload: json!({
            "firstName": first_name,
            "lastName": last_name,
            "payload": body.payload.clone().unwrap_or_else(|| json!({})),
        }),
        request_id: request_id.0.clone(),
    };
    let event_id = state.store.insert_event(event).await.map_err(|err| {
        record_write("error");
        api_internal("failed to record customer event", &err).with_request_id(request_id.as_str())
    })?;
    tracing::debug!(request_id = %request_id, event_id, "customer event recorded");
    record_write("stored");

    Ok((
        StatusCode::CREATED,
        Json(CustomerStoredResponse {
            message: STORED.to_string(),
            customer,
        }),
    ))
}
