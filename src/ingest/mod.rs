//! Fetch, transform and index one page of data API results
//!
//! A cycle is strictly sequential:
//!
//! 1. Build the request from the fixed query params, the current key and
//!    the watermark (`publishedAfter`)
//! 2. Send it, bounded by the request timeout and abandoned on shutdown
//! 3. 200 continues; 403 rotates the key and ends the cycle; anything else
//!    is a [`IngestError::Transport`] error
//! 4. Advance the watermark to now
//! 5. Decode the body and flatten each item into a [`VideoRecord`]
//! 6. Bulk index the records; rejected documents are logged and counted

pub mod error;
pub mod response;
pub mod watermark;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use url::Url;

use crate::config::FetchConfig;
use crate::keystore::{redact, KeyStore};
use crate::metrics;
use crate::models::VideoRecord;
use crate::search::{BulkIndexer, BulkIndexerConfig, BulkIndexerStats, SearchIndex};
use crate::utils::wait_for_shutdown;

pub use error::{IngestError, IngestResult};
pub use response::SearchListResponse;
pub use watermark::Watermark;

/// Result of a cycle that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Response processed; `failed` documents were rejected by the index
    Indexed {
        fetched: usize,
        indexed: u64,
        failed: u64,
    },

    /// Provider refused the key; the pool moved to the next one
    QuotaExhausted,

    /// Shutdown fired while the request was in flight
    Cancelled,
}

impl CycleOutcome {
    /// Label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Indexed { .. } => "indexed",
            Self::QuotaExhausted => "quota_exhausted",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One unit of scheduled work
#[async_trait]
pub trait IngestCycle: Send + Sync {
    async fn run_cycle(&self) -> IngestResult<CycleOutcome>;
}

/// Pulls from the data API and writes into the search index
pub struct IngestionPipeline {
    http: reqwest::Client,
    fetch: FetchConfig,
    keys: Arc<dyn KeyStore>,
    watermark: Watermark,
    index: Arc<dyn SearchIndex>,
    bulk: BulkIndexerConfig,
    shutdown: watch::Receiver<bool>,
}

impl IngestionPipeline {
    pub fn new(
        fetch: FetchConfig,
        keys: Arc<dyn KeyStore>,
        index: Arc<dyn SearchIndex>,
        bulk: BulkIndexerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> IngestResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("yt-indexer/{}", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()
            .map_err(|e| IngestError::RequestBuild(e.to_string()))?;

        let watermark = Watermark::with_lookback(fetch.lookback());

        Ok(Self {
            http,
            fetch,
            keys,
            watermark,
            index,
            bulk,
            shutdown,
        })
    }

    pub fn watermark(&self) -> &Watermark {
        &self.watermark
    }

    /// Request URL for the current key and watermark
    pub fn request_url(&self) -> IngestResult<Url> {
        let mut url = Url::parse(&self.fetch.base_url)
            .map_err(|e| IngestError::RequestBuild(format!("{}: {e}", self.fetch.base_url)))?;

        {
            let mut query = url.query_pairs_mut();
            for (name, value) in &self.fetch.query_params {
                query.append_pair(name, value);
            }
            query.append_pair("key", &self.keys.get());
            query.append_pair("publishedAfter", &self.watermark.to_rfc3339());
        }

        Ok(url)
    }

    async fn send_request(&self, url: Url, timeout: Duration) -> IngestResult<Option<reqwest::Response>> {
        let mut shutdown = self.shutdown.clone();
        let request = self.http.get(url).timeout(timeout).send();

        tokio::select! {
            result = request => Ok(Some(result?)),
            _ = wait_for_shutdown(&mut shutdown) => Ok(None),
        }
    }

    async fn index_records(&self, records: &[VideoRecord]) -> IngestResult<BulkIndexerStats> {
        let mut indexer = BulkIndexer::new(Arc::clone(&self.index), self.bulk.clone())
            .map_err(IngestError::IndexerInit)?;

        for record in records {
            indexer.add(record).map_err(IngestError::Encode)?;
        }

        let stats = indexer.close().await.map_err(IngestError::IndexFlush)?;
        if stats.num_failed > 0 {
            tracing::warn!(count = stats.num_failed, "Failed to index some documents");
        }
        Ok(stats)
    }
}

#[async_trait]
impl IngestCycle for IngestionPipeline {
    async fn run_cycle(&self) -> IngestResult<CycleOutcome> {
        let url = self.request_url()?;
        tracing::debug!(published_after = %self.watermark.to_rfc3339(), "Querying data API");

        let Some(response) = self.send_request(url, self.fetch.request_timeout()).await? else {
            tracing::debug!("Data API request abandoned on shutdown");
            return Ok(CycleOutcome::Cancelled);
        };

        match response.status() {
            StatusCode::OK => {}
            StatusCode::FORBIDDEN => {
                self.keys.rotate();
                self.watermark.advance_to_now();
                metrics::record_key_rotation();
                tracing::info!(
                    next_key = %redact(&self.keys.get()),
                    "Quota exhausted, rotating API keys to bypass quota limits"
                );
                return Ok(CycleOutcome::QuotaExhausted);
            }
            status => {
                return Err(IngestError::Transport {
                    status: status.as_u16(),
                })
            }
        }

        self.watermark.advance_to_now();

        let body = response.bytes().await?;
        let decoded: SearchListResponse =
            serde_json::from_slice(&body).map_err(IngestError::Decode)?;
        let records = decoded.into_records();
        let fetched = records.len();

        if records.is_empty() {
            tracing::debug!("No new items since last fetch");
            return Ok(CycleOutcome::Indexed {
                fetched: 0,
                indexed: 0,
                failed: 0,
            });
        }

        let stats = self.index_records(&records).await?;
        metrics::record_documents(stats.num_flushed, stats.num_failed);
        tracing::info!(
            fetched,
            indexed = stats.num_flushed,
            failed = stats.num_failed,
            index = %self.index.index_name(),
            "Indexed data API results"
        );

        Ok(CycleOutcome::Indexed {
            fetched,
            indexed: stats.num_flushed,
            failed: stats.num_failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::InMemoryKeyStore;
    use crate::search::{BulkResponse, SearchHits, SearchResult};
    use serde_json::Value;

    struct NullIndex;

    #[async_trait]
    impl SearchIndex for NullIndex {
        fn index_name(&self) -> &str {
            "null"
        }
        async fn ping(&self) -> SearchResult<()> {
            Ok(())
        }
        async fn ensure_index(&self) -> SearchResult<()> {
            Ok(())
        }
        async fn bulk(&self, _documents: Vec<Value>) -> SearchResult<BulkResponse> {
            Ok(BulkResponse::default())
        }
        async fn search(&self, _query: Value) -> SearchResult<SearchHits> {
            Ok(SearchHits::default())
        }
    }

    fn pipeline(fetch: FetchConfig) -> IngestionPipeline {
        let keys = Arc::new(InMemoryKeyStore::new(vec!["key-a".into(), "key-b".into()]).unwrap());
        let (_tx, rx) = watch::channel(false);
        IngestionPipeline::new(fetch, keys, Arc::new(NullIndex), BulkIndexerConfig::default(), rx)
            .unwrap()
    }

    #[test]
    fn test_request_url_carries_params_key_and_watermark() {
        let mut fetch = FetchConfig::default();
        fetch.query_params.insert("q".to_string(), "rust lang".to_string());
        let pipeline = pipeline(fetch);

        let url = pipeline.request_url().unwrap();
        let pairs: std::collections::HashMap<String, String> =
            url.query_pairs().into_owned().collect();

        assert_eq!(url.path(), "/youtube/v3/search");
        assert_eq!(pairs["q"], "rust lang");
        assert_eq!(pairs["part"], "snippet");
        assert_eq!(pairs["key"], "key-a");
        assert_eq!(pairs["publishedAfter"], pipeline.watermark().to_rfc3339());
    }

    #[test]
    fn test_bad_base_url_is_request_build_error() {
        let fetch = FetchConfig {
            base_url: "not a url".to_string(),
            ..FetchConfig::default()
        };
        let result = pipeline(fetch).request_url();
        assert!(matches!(result, Err(IngestError::RequestBuild(_))));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(CycleOutcome::QuotaExhausted.label(), "quota_exhausted");
        assert_eq!(
            CycleOutcome::Indexed { fetched: 1, indexed: 1, failed: 0 }.label(),
            "indexed"
        );
    }
}
