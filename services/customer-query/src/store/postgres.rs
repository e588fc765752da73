//! Postgres-backed implementation of the customer store.
//!
//! # What this module is
//! This module implements the `CustomerStore` trait using Postgres (via `sqlx`) as the durable
//! backing store for customers and their append-only audit events.
//!
//! # Key invariants
//! - `customers.rut` is the primary key; upserts overwrite both name columns on conflict.
//! - `customer_events` rows are only ever inserted. `id` and `created_at` come from Postgres.
//! - Every operation is exactly one parameterized statement. There is no transaction spanning
//!   the customer upsert and the event insert; callers own that ordering.
//!
//! # Pool lifecycle
//! The pool lives in a [`PoolHandle`]: built lazily on first use, shared afterwards, and
//! closed once on shutdown. After [`PoolHandle::close`] every operation fails with
//! [`StoreError::Closed`] instead of silently reopening connections.
//!
//! # Timeouts
//! - `statement_timeout` is set as a session option on every physical connection, so a slow
//!   statement surfaces as an ordinary query error.
//! - `acquire_timeout` bounds how long a request waits for a pooled connection.
//!
//! # Security notes
//! - The password is only handed to `PgConnectOptions`; never log it.
//! - All values are bound parameters; no SQL is built from request input.
use super::{CustomerStore, StoreError, StoreResult};
use crate::config::{DbEndpoint, PostgresConfig};
use crate::model::{Customer, NewCustomerEvent};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use tokio::sync::RwLock;

const APPLICATION_NAME: &str = "customer-query";

/// Row shape for the `customers` table.
#[derive(Debug, Clone, FromRow)]
struct DbCustomer {
    rut: String,
    first_name: String,
    last_name: String,
}

impl From<DbCustomer> for Customer {
    fn from(row: DbCustomer) -> Self {
        Self {
            rut: row.rut,
            first_name: row.first_name,
            last_name: row.last_name,
        }
    }
}

enum PoolState {
    Idle,
    Ready(PgPool),
    Closed,
}

/// Lazily initialized, explicitly closed connection pool.
///
/// # What it does
/// Builds the `PgPool` the first time [`PoolHandle::get`] is called and returns clones of that
/// same pool on every later call.
///
/// # Errors
/// - [`StoreError::Closed`] once [`PoolHandle::close`] has run.
pub struct PoolHandle {
    connect_options: PgConnectOptions,
    pool_options: PgPoolOptions,
    state: RwLock<PoolState>,
}

impl PoolHandle {
    pub fn new(pg: &PostgresConfig) -> Self {
        let base = PgConnectOptions::new()
            .username(&pg.user)
            .password(&pg.password)
            .database(&pg.database)
            .application_name(APPLICATION_NAME)
            .options([("statement_timeout", pg.statement_timeout_ms.to_string())]);
        let connect_options = match &pg.endpoint {
            DbEndpoint::Socket(dir) => base.socket(dir),
            DbEndpoint::Tcp { host, port } => base.host(host).port(*port),
        };
        let pool_options = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms));
        Self {
            connect_options,
            pool_options,
            state: RwLock::new(PoolState::Idle),
        }
    }

    /// Return the process-wide pool, creating it on the first call.
    pub async fn get(&self) -> StoreResult<PgPool> {
        match &*self.state.read().await {
            PoolState::Ready(pool) => return Ok(pool.clone()),
            PoolState::Closed => return Err(StoreError::Closed),
            PoolState::Idle => {}
        }
        let mut state = self.state.write().await;
        // Another task may have initialized the pool between the two locks.
        match &*state {
            PoolState::Ready(pool) => Ok(pool.clone()),
            PoolState::Closed => Err(StoreError::Closed),
            PoolState::Idle => {
                let pool = self
                    .pool_options
                    .clone()
                    .connect_lazy_with(self.connect_options.clone());
                tracing::info!(
                    max_connections = pool.options().get_max_connections(),
                    "database pool created"
                );
                *state = PoolState::Ready(pool.clone());
                Ok(pool)
            }
        }
    }

    pub async fn is_initialized(&self) -> bool {
        matches!(&*self.state.read().await, PoolState::Ready(_))
    }

    /// Drain and close the pool. Later calls are no-ops.
    pub async fn close(&self) {
        let previous = std::mem::replace(&mut *self.state.write().await, PoolState::Closed);
        if let PoolState::Ready(pool) = previous {
            pool.close().await;
            tracing::info!("database pool closed");
        }
    }
}

/// Durable customer store backed by Postgres.
///
/// # Example
/// ```rust,no_run
/// use customer_query::config::PostgresConfig;
/// use customer_query::store::postgres::PostgresStore;
///
/// async fn open(pg: PostgresConfig) {
///     let _ = PostgresStore::connect(&pg).await;
/// }
/// ```
pub struct PostgresStore {
    pool: PoolHandle,
}

impl PostgresStore {
    /// Create the store and, when `run_migrations` is set, bring the schema up to date.
    ///
    /// # Errors
    /// - Migration failures, which also cover an unreachable database.
    pub async fn connect(pg: &PostgresConfig) -> StoreResult<Self> {
        let store = Self {
            pool: PoolHandle::new(pg),
        };
        if pg.run_migrations {
            // Fail startup rather than serve against a schema we could not apply.
            let pool = store.pool.get().await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
        }
        Ok(store)
    }

    pub fn pool_handle(&self) -> &PoolHandle {
        &self.pool
    }
}

#[async_trait]
impl CustomerStore for PostgresStore {
    async fn find_by_rut(&self, rut: &str) -> StoreResult<Option<Customer>> {
        let pool = self.pool.get().await?;
        let row = sqlx::query_as::<_, DbCustomer>(
            "SELECT rut, first_name, last_name FROM customers WHERE rut = $1",
        )
        .bind(rut)
        .fetch_optional(&pool)
        .await?;
        Ok(row.map(Customer::from))
    }

    async fn upsert(
        &self,
        rut: &str,
        first_name: &str,
        last_name: &str,
    ) -> StoreResult<Customer> {
        let pool = self.pool.get().await?;
        let row = sqlx::query_as::<_, DbCustomer>(
            r#"
            INSERT INTO customers (rut, first_name, last_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (rut)
            DO UPDATE SET first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name
            RETURNING rut, first_name, last_name
            "#,
        )
        .bind(rut)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(&pool)
        .await?;
        Ok(row.into())
    }

    async fn insert_event(&self, event: NewCustomerEvent) -> StoreResult<i64> {
        let pool = self.pool.get().await?;
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO customer_events (rut, payload, request_id, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id
            "#,
        )
        .bind(&event.rut)
        .bind(&event.payload)
        .bind(&event.request_id)
        .fetch_one(&pool)
        .await?;
        Ok(id)
    }

    async fn health_check(&self) -> StoreResult<()> {
        let pool = self.pool.get().await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn pg_config(endpoint: DbEndpoint) -> PostgresConfig {
        PostgresConfig {
            endpoint,
            user: "svc".to_string(),
            password: "pw".to_string(),
            database: "customers".to_string(),
            max_connections: 3,
            statement_timeout_ms: 1_000,
            acquire_timeout_ms: 200,
            run_migrations: false,
        }
    }

    #[tokio::test]
    async fn pool_is_built_lazily_and_once() {
        let handle = PoolHandle::new(&pg_config(DbEndpoint::Tcp {
            host: "127.0.0.1".to_string(),
            port: 1,
        }));
        assert!(!handle.is_initialized().await);

        let first = handle.get().await.expect("pool");
        assert!(handle.is_initialized().await);
        assert_eq!(first.options().get_max_connections(), 3);

        // A lazy pool opens no connections until a query runs.
        let second = handle.get().await.expect("pool");
        assert_eq!(second.size(), 0);
        assert_eq!(first.size(), second.size());
    }

    #[tokio::test]
    async fn closed_handle_stays_closed() {
        let handle = PoolHandle::new(&pg_config(DbEndpoint::Socket(PathBuf::from(
            "/cloudsql/proj:region:db",
        ))));
        let pool = handle.get().await.expect("pool");
        handle.close().await;
        assert!(pool.is_closed());
        assert!(!handle.is_initialized().await);
        assert!(matches!(handle.get().await, Err(StoreError::Closed)));

        // Closing twice is harmless.
        handle.close().await;
    }

    #[tokio::test]
    async fn close_before_use_blocks_initialization() {
        let handle = PoolHandle::new(&pg_config(DbEndpoint::Tcp {
            host: "localhost".to_string(),
            port: 5432,
        }));
        handle.close().await;
        assert!(matches!(handle.get().await, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn unreachable_database_surfaces_store_error() {
        let store = PostgresStore {
            pool: PoolHandle::new(&pg_config(DbEndpoint::Tcp {
                host: "127.0.0.1".to_string(),
                port: 1,
            })),
        };
        let err = store.find_by_rut("12345678-5").await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
        assert!(store.health_check().await.is_err());
        assert!(store.is_durable());
        store.close().await;
    }
}
