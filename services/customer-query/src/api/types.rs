//! HTTP API request/response types.
//!
//! # Purpose
//! Defines the JSON payload shapes for the customer API and OpenAPI schema
//! generation. Field names are camelCase on the wire.
use crate::model::Customer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub message: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Body of `POST /customers`.
///
/// Every field is optional at the parsing layer so the handler can report a
/// missing `rut` as 400 and missing names as 422.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CustomerCreateRequest {
    #[schema(example = "12.345.678-5")]
    pub rut: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Free-form metadata recorded on the audit event.
    #[schema(value_type = Option<Object>)]
    pub payload: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct CustomerStoredResponse {
    pub message: String,
    pub customer: Customer,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_request_reads_camel_case() {
        let request: CustomerCreateRequest = serde_json::from_value(json!({
            "rut": "12.345.678-5",
            "firstName": "Ana",
            "lastName": "Diaz",
            "payload": {"source": "crm"}
        }))
        .expect("request");
        assert_eq!(request.first_name.as_deref(), Some("Ana"));
        assert_eq!(request.payload, Some(json!({"source": "crm"})));

        let empty: CustomerCreateRequest = serde_json::from_value(json!({})).expect("empty");
        assert!(empty.rut.is_none() && empty.payload.is_none());
    }

    #[test]
    fn error_response_omits_missing_request_id() {
        let body = serde_json::to_value(ErrorResponse {
            message: "Customer not found".to_string(),
            code: "not_found".to_string(),
            request_id: None,
        })
        .expect("json");
        assert_eq!(body, json!({"message": "Customer not found", "code": "not_found"}));

        let body = serde_json::to_value(ErrorResponse {
            message: "Invalid RUT".to_string(),
            code: "validation_error".to_string(),
            request_id: Some("req-1".to_string()),
        })
        .expect("json");
        assert_eq!(body["requestId"], "req-1");
    }
}
