//! Customer query service library crate.
//!
//! # Purpose
//! Exposes the customer API surface, bearer authentication, configuration, RUT
//! validation, and storage implementations for use by the binary and tests.
pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod model;
pub mod observability;
pub mod rut;
pub mod store;
