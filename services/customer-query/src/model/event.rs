//! Customer audit event definitions.
//!
//! # Purpose
//! Defines the append-only audit record written once per successful customer
//! write, and the insert payload used to create it.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Audit row to append; `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomerEvent {
    pub rut: String,
    pub payload: Value,
    pub request_id: String,
}

/// A stored audit row from `customer_events`. Never mutated after insert.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerEvent {
    pub id: i64,
    pub rut: String,
    pub payload: Value,
    pub request_id: String,
    pub created_at: DateTime<Utc>,
}
