//! Customer record definition.
//!
//! # Purpose
//! Defines the stored customer row keyed by a normalized RUT.
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A customer as persisted in the `customers` table.
///
/// `rut` is always in canonical form (see [`crate::rut::normalize`]). Serializes
/// with camelCase field names, which is also the HTTP response shape.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[schema(example = "12345678-5")]
    pub rut: String,
    pub first_name: String,
    pub last_name: String,
}
