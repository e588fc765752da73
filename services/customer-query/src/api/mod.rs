//! Customer HTTP API module.
//!
//! # Purpose
//! Exposes route handler modules, the shared error helpers, and the OpenAPI
//! document.
pub mod customers;
pub mod error;
pub mod openapi;
pub mod system;
pub mod types;
