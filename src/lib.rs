//! yt-indexer - YouTube search indexer
//!
//! Periodically pulls the newest videos for a configured query from the
//! YouTube Data API, bulk-indexes them into OpenSearch and serves them back
//! through a small read API. Any number of replicas may run; a lease-based
//! election makes sure only one of them polls the data API at a time.
//!
//! # Architecture
//!
//! - [`config`] - Configuration loading, environment overrides, validation
//! - [`keystore`] - Rotating pool of data API keys
//! - [`election`] - Leader election over a coordination backend
//! - [`scheduler`] - Ticker that runs ingestion only while leading
//! - [`ingest`] - One fetch-decode-index cycle against the data API
//! - [`search`] - OpenSearch client, queries and the concurrent bulk indexer
//! - [`api`] - Read API (axum)
//! - [`metrics`] - Prometheus metrics
//! - [`service`] - Wires the above into a running process
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use yt_indexer::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Path::new("config/indexer.toml"))?;
//!     yt_indexer::service::run(config, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod election;
pub mod error;
pub mod ingest;
pub mod keystore;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod search;
pub mod service;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::election::{Elector, LeaderElector};
    pub use crate::error::{Error, ErrorCategory, IndexerErrorTrait, Result};
    pub use crate::ingest::{CycleOutcome, IngestCycle, IngestionPipeline};
    pub use crate::keystore::{InMemoryKeyStore, KeyStore};
    pub use crate::models::{SearchPage, VideoRecord};
    pub use crate::search::{OpenSearchIndex, SearchIndex};
}

pub use models::{SearchPage, VideoRecord};
