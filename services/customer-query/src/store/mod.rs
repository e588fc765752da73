//! Customer storage abstraction.
//!
//! # Purpose
//! Defines the [`CustomerStore`] trait consumed by HTTP handlers and the error
//! type every backend reports.
//!
//! # Key invariants
//! - `rut` arguments are already normalized; stores never re-validate them.
//! - Failures propagate unchanged; no backend retries locally.
use crate::model::{Customer, NewCustomerEvent};
use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store is closed")]
    Closed,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Exact-match lookup; `Ok(None)` when no row matches.
    async fn find_by_rut(&self, rut: &str) -> StoreResult<Option<Customer>>;
    /// Insert-or-update keyed by `rut`, returning the stored row.
    async fn upsert(&self, rut: &str, first_name: &str, last_name: &str)
    -> StoreResult<Customer>;
    /// Append an audit row and return its generated id.
    async fn insert_event(&self, event: NewCustomerEvent) -> StoreResult<i64>;

    async fn health_check(&self) -> StoreResult<()>;
    /// Release backend resources. Safe to call more than once.
    async fn close(&self);
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
