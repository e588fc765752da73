//! Customer query HTTP service entry point.
//!
//! # Purpose
//! Wires configuration, storage, the bearer token verifier, and the HTTP
//! router, then serves the API and the metrics listener until SIGINT/SIGTERM.
//!
//! # Notes
//! The `build_state` helper keeps wiring testable and minimizes main setup logic.
use anyhow::Context;
use customer_query::app::{AppState, build_router};
use customer_query::auth::oidc::JwtVerifier;
use customer_query::config::{ServiceConfig, StorageBackend};
use customer_query::observability;
use customer_query::store::CustomerStore;
use customer_query::store::memory::InMemoryStore;
use customer_query::store::postgres::PostgresStore;
use std::future::Future;
use std::sync::Arc;

const SERVICE_NAME: &str = "customer-query-service";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env_or_yaml().context("load configuration")?;
    run_with_shutdown(config, shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT received, shutting down"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}

async fn run_with_shutdown<F>(config: ServiceConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle =
        observability::init_observability(SERVICE_NAME, &config.log_level, config.log_format);
    let state = build_state(&config).await?;
    tracing::info!(
        backend = state.store.backend_name(),
        durable = state.store.is_durable(),
        "customer store ready"
    );

    let metrics_bind = config.metrics_bind;
    let metrics_task = tokio::spawn(async move {
        if let Err(err) = observability::serve_metrics(metrics_handle, metrics_bind).await {
            tracing::warn!(error = %err, %metrics_bind, "metrics listener stopped");
        }
    });

    let app = build_router(state.clone());
    let addr = config.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, "customer query service listening");
    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await;

    metrics_task.abort();
    let _ = metrics_task.await;
    // In-flight requests have drained; release database connections last.
    state.store.close().await;
    tracing::info!("server closed");
    served.context("serve http")
}

async fn build_state(config: &ServiceConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn CustomerStore> = match config.storage {
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        StorageBackend::Postgres => {
            let pg = config
                .postgres
                .as_ref()
                .context("postgres configuration missing")?;
            Arc::new(
                PostgresStore::connect(pg)
                    .await
                    .context("connect customer store")?,
            )
        }
    };

    Ok(AppState {
        store,
        verifier: Arc::new(JwtVerifier::new(config.oidc.clone())),
    })
}
