#![allow(dead_code)]

use async_trait::async_trait;
use customer_query::app::{AppState, build_router};
use customer_query::auth::{AuthError, Principal, TokenVerifier};
use customer_query::model::{Customer, NewCustomerEvent};
use customer_query::store::memory::InMemoryStore;
use customer_query::store::{CustomerStore, StoreError, StoreResult};
use std::sync::{Arc, Mutex};

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

/// Accepts `valid-token`, rejects `foreign-issuer-token` as another issuer,
/// and treats anything else as a bad signature.
pub struct StaticVerifier;

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        match token {
            "valid-token" => Ok(Principal {
                issuer: "https://issuer.example/".to_string(),
                subject: "auth0|tester".to_string(),
            }),
            "foreign-issuer-token" => Err(AuthError::IssuerNotAllowed),
            _ => Err(AuthError::InvalidClaim("signature".to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Find(String),
    Upsert(String, String, String),
    InsertEvent(NewCustomerEvent),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Failure {
    #[default]
    None,
    Find,
    Upsert,
    InsertEvent,
    PanicOnFind,
}

/// In-memory store that records every call and can be told to fail one operation.
#[derive(Default)]
pub struct RecordingStore {
    inner: InMemoryStore,
    calls: Mutex<Vec<Call>>,
    failure: Failure,
    stored_names: Option<(String, String)>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failure: Failure) -> Self {
        Self {
            failure,
            ..Self::default()
        }
    }

    /// Make `upsert` report these names instead of the submitted ones.
    pub fn storing_names(first_name: &str, last_name: &str) -> Self {
        Self {
            stored_names: Some((first_name.to_string(), last_name.to_string())),
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn injected(&self, failure: Failure) -> StoreResult<()> {
        if self.failure == failure {
            return Err(StoreError::Unexpected(anyhow::anyhow!("injected failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl CustomerStore for RecordingStore {
    async fn find_by_rut(&self, rut: &str) -> StoreResult<Option<Customer>> {
        self.record(Call::Find(rut.to_string()));
        if self.failure == Failure::PanicOnFind {
            panic!("store exploded");
        }
        self.injected(Failure::Find)?;
        self.inner.find_by_rut(rut).await
    }

    async fn upsert(
        &self,
        rut: &str,
        first_name: &str,
        last_name: &str,
    ) -> StoreResult<Customer> {
        self.record(Call::Upsert(
            rut.to_string(),
            first_name.to_string(),
            last_name.to_string(),
        ));
        self.injected(Failure::Upsert)?;
        match &self.stored_names {
            Some((first, last)) => self.inner.upsert(rut, first, last).await,
            None => self.inner.upsert(rut, first_name, last_name).await,
        }
    }

    async fn insert_event(&self, event: NewCustomerEvent) -> StoreResult<i64> {
        self.record(Call::InsertEvent(event.clone()));
        self.injected(Failure::InsertEvent)?;
        self.inner.insert_event(event).await
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn close(&self) {}

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

pub fn app_with_store(store: Arc<RecordingStore>) -> axum::Router {
    build_router(AppState {
        store,
        verifier: Arc::new(StaticVerifier),
    })
}
