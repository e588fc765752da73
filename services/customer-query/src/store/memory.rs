//! In-memory implementation of the customer store.
//!
//! # Purpose
//! This store implements the `CustomerStore` trait entirely in memory using a `HashMap` and an
//! append-only `Vec` guarded by `tokio::sync::RwLock`. It exists for:
//! - local development without a database (`STORAGE_BACKEND=memory`)
//! - tests that need deterministic, race-free storage
//!
//! # Durability and consistency
//! - **Not durable**: all customers and audit events are lost on process restart.
//! - **Single-process consistency**: writes take the write lock, reads take the read lock.
//! - Like the Postgres backend, the customer upsert and the event append are independent
//!   operations; nothing couples them.
use super::{CustomerStore, StoreResult};
use crate::model::{Customer, CustomerEvent, NewCustomerEvent};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Append-only audit log with locally assigned ids, starting at 1 like a `BIGSERIAL`.
#[derive(Debug, Default)]
struct EventLog {
    next_id: i64,
    items: Vec<CustomerEvent>,
}

impl EventLog {
    fn append(&mut self, event: NewCustomerEvent) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        self.items.push(CustomerEvent {
            id,
            rut: event.rut,
            payload: event.payload,
            request_id: event.request_id,
            created_at: Utc::now(),
        });
        id
    }
}

/// In-memory customer store.
///
/// Cloning shares the underlying maps, so a clone handed to the router and one kept by a
/// test observe the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    /// Authoritative customers keyed by normalized RUT.
    customers: Arc<RwLock<HashMap<String, Customer>>>,
    /// Audit events in insertion order.
    events: Arc<RwLock<EventLog>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every audit event appended so far.
    pub async fn events(&self) -> Vec<CustomerEvent> {
        self.events.read().await.items.clone()
    }
}

#[async_trait]
impl CustomerStore for InMemoryStore {
    async fn find_by_rut(&self, rut: &str) -> StoreResult<Option<Customer>> {
        Ok(self.customers.read().await.get(rut).cloned())
    }

    async fn upsert(
        &self,
        rut: &str,
        first_name: &str,
        last_name: &str,
    ) -> StoreResult<Customer> {
        let customer = Customer {
            rut: rut.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        };
        self.customers
            .write()
            .await
            .insert(customer.rut.clone(), customer.clone());
        Ok(customer)
    }

    async fn insert_event(&self, event: NewCustomerEvent) -> StoreResult<i64> {
        Ok(self.events.write().await.append(event))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn close(&self) {}

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn find_returns_none_for_unknown_rut() {
        let store = InMemoryStore::new();
        assert_eq!(store.find_by_rut("12345678-5").await.expect("find"), None);
    }

    #[tokio::test]
    async fn upsert_overwrites_names() {
        let store = InMemoryStore::new();
        store
            .upsert("12345678-5", "Ana", "Diaz")
            .await
            .expect("insert");
        let updated = store
            .upsert("12345678-5", "Ana Maria", "Diaz Soto")
            .await
            .expect("update");
        assert_eq!(updated.first_name, "Ana Maria");

        let found = store
            .find_by_rut("12345678-5")
            .await
            .expect("find")
            .expect("customer");
        assert_eq!(found, updated);
    }

    #[tokio::test]
    async fn events_get_increasing_ids() {
        let store = InMemoryStore::new();
        let first = store
            .insert_event(NewCustomerEvent {
                rut: "12345678-5".to_string(),
                payload: json!({"firstName": "Ana"}),
                request_id: "req-1".to_string(),
            })
            .await
            .expect("event");
        let second = store
            .insert_event(NewCustomerEvent {
                rut: "12345678-5".to_string(),
                payload: json!({}),
                request_id: "req-2".to_string(),
            })
            .await
            .expect("event");
        assert_eq!((first, second), (1, 2));

        let events = store.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].request_id, "req-1");
        assert_eq!(events[0].payload["firstName"], "Ana");
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = InMemoryStore::new();
        let handle = store.clone();
        handle.upsert("6-K", "Juan", "Perez").await.expect("upsert");
        assert!(store.find_by_rut("6-K").await.expect("find").is_some());
        assert!(!store.is_durable());
        assert_eq!(store.backend_name(), "memory");
    }
}
