//! Process wiring: election, leader-gated ingestion and the read API
//!
//! [`run`] builds every component from [`Config`], then runs three
//! long-lived tasks until either `stop` resolves or one of them reports a
//! fatal error:
//!
//! ```text
//!              ┌──────────────┐  campaign()  ┌──────────────┐
//!              │  Scheduler   │─────────────▶│   Elector    │──▶ backend
//!              │ (ticker)     │◀── is_leader │ (task)       │
//!              └──────┬───────┘              └──────────────┘
//!                     │ run_cycle()
//!              ┌──────▼───────┐   _bulk      ┌──────────────┐
//!  data API ◀──│  Ingestion   │─────────────▶│ Search index │◀── Read API
//!              └──────────────┘              └──────────────┘
//! ```
//!
//! All tasks share one `watch` shutdown flag. The first fatal error wins
//! the error channel; later ones are dropped.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::api::{ApiServer, AppState};
use crate::config::{Config, ElectionBackendKind, ElectionConfig, SearchConfig};
use crate::election::{
    CoordinationBackend, ElectorConfig, LeaderElector, RedisBackend, RedisBackendConfig,
    StandaloneBackend,
};
use crate::error::{Error, Result};
use crate::ingest::IngestionPipeline;
use crate::keystore::{InMemoryKeyStore, KeyStore};
use crate::scheduler::LeaderGatedScheduler;
use crate::search::{bulk, BulkIndexerConfig, OpenSearchIndex, SearchIndex};
use crate::utils::retry::{with_retry_if, RetryConfig};
use crate::utils::wait_for_shutdown;

/// Capacity of the fatal error channel; one slot per error-producing task
const ERROR_CHANNEL_CAPACITY: usize = 2;

/// Bulk indexer settings from the search section
pub fn bulk_config(search: &SearchConfig) -> BulkIndexerConfig {
    BulkIndexerConfig {
        workers: search.bulk_workers.unwrap_or_else(bulk::default_workers),
        flush_bytes: search.bulk_flush_bytes,
    }
}

/// Build the key pool; fails on an empty pool
pub fn build_keystore(config: &Config) -> Result<Arc<dyn KeyStore>> {
    let store = InMemoryKeyStore::new(config.fetch.keys.clone())?;
    tracing::info!(keys = store.len(), "API key pool loaded");
    Ok(Arc::new(store))
}

/// Create the search client and wait until the cluster answers
pub async fn connect_index(config: &SearchConfig) -> Result<Arc<dyn SearchIndex>> {
    let index = OpenSearchIndex::new(config)?;

    with_retry_if(
        "search index ping",
        &RetryConfig::default(),
        || index.ping(),
        |e| e.is_recoverable(),
    )
    .await?;
    index.ensure_index().await?;

    tracing::info!(url = %config.url, index = %config.index, "Connected to search index");
    Ok(Arc::new(index))
}

/// Create the configured coordination backend
pub async fn connect_backend(config: &ElectionConfig) -> Result<Arc<dyn CoordinationBackend>> {
    match config.backend {
        ElectionBackendKind::Standalone => {
            tracing::info!("Using standalone election backend");
            Ok(Arc::new(StandaloneBackend::new()))
        }
        ElectionBackendKind::Redis => {
            let redis_config = RedisBackendConfig {
                url: config.redis_url.clone(),
                lease_ttl: config.lease_ttl(),
                campaign_retry: config.campaign_retry(),
            };

            let backend = with_retry_if(
                "coordination backend connect",
                &RetryConfig::default(),
                || RedisBackend::connect(redis_config.clone()),
                |e| e.is_recoverable(),
            )
            .await?;

            tracing::info!(url = %config.redis_url, "Connected to Redis election backend");
            Ok(Arc::new(backend))
        }
    }
}

/// Validate `config`, build every component and run until `stop` resolves
pub async fn run(config: Config, stop: impl Future<Output = ()> + Send) -> Result<()> {
    config
        .validate()
        .map_err(|e| Error::config(format!("{e:#}")))?;

    let keys = build_keystore(&config)?;
    let index = connect_index(&config.search).await?;
    let backend = connect_backend(&config.election).await?;

    run_with(config, keys, index, backend, stop).await
}

/// Run the service on already-built components
///
/// Returns `Ok(())` when `stop` resolved first, or the first fatal error
/// reported by the scheduler or the read API.
pub async fn run_with(
    config: Config,
    keys: Arc<dyn KeyStore>,
    index: Arc<dyn SearchIndex>,
    backend: Arc<dyn CoordinationBackend>,
    stop: impl Future<Output = ()> + Send,
) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (error_tx, mut error_rx) = mpsc::channel::<Error>(ERROR_CHANNEL_CAPACITY);

    let candidate = config.election.candidate();
    tracing::info!(candidate = %candidate, key = %config.election.election_key, "Starting elector");
    let elector_config = ElectorConfig {
        election_key: config.election.election_key.clone(),
        candidate_id: candidate,
        lease_check_interval: config.election.lease_check_interval(),
    };
    let (elector, election_task) = LeaderElector::start(backend, elector_config, shutdown_rx.clone());

    let pipeline = IngestionPipeline::new(
        config.fetch.clone(),
        keys,
        Arc::clone(&index),
        bulk_config(&config.search),
        shutdown_rx.clone(),
    )?;

    let scheduler = LeaderGatedScheduler::new(
        elector.clone(),
        Arc::new(pipeline),
        config.fetch.interval(),
        error_tx.clone(),
    );
    let scheduler_task = tokio::spawn(scheduler.run(shutdown_rx.clone()));

    let server = ApiServer::new(&config.server, AppState::new(index, elector));
    let server_task = spawn_server(server, shutdown_rx, error_tx);

    let outcome = tokio::select! {
        _ = stop => {
            tracing::info!("Shutdown signal received, stopping");
            None
        }
        Some(e) = error_rx.recv() => {
            tracing::error!(error = %e, "Fatal error, stopping");
            Some(e)
        }
    };

    shutdown_tx.send_replace(true);
    join("scheduler", scheduler_task).await;
    join("read API", server_task).await;
    join("election", election_task).await;

    match outcome {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn spawn_server(
    server: ApiServer,
    mut shutdown: watch::Receiver<bool>,
    errors: mpsc::Sender<Error>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let signal = async move { wait_for_shutdown(&mut shutdown).await };
        if let Err(e) = server.start_with_shutdown(signal).await {
            tracing::error!(error = %e, "Read API stopped");
            let _ = errors.try_send(Error::with_source("read API failed", e));
        }
    })
}

async fn join(name: &str, task: JoinHandle<()>) {
    if let Err(e) = task.await {
        tracing::error!(task = name, error = %e, "Task panicked or was cancelled");
    }
}
