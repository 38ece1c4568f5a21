//! Chunked bulk indexing with a bounded worker pool
//!
//! Documents are buffered with [`BulkIndexer::add`] and split into chunks
//! whose encoded size stays under `flush_bytes`. [`BulkIndexer::close`]
//! sends every chunk as its own `_bulk` request, at most `workers` at a
//! time, and folds the per-document outcomes into [`BulkIndexerStats`].

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;

use super::{BulkResponse, SearchError, SearchIndex, SearchResult};

/// Default flush threshold per bulk request
pub const DEFAULT_FLUSH_BYTES: usize = 5 * 1024 * 1024;

/// Worker count when none is configured
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Bulk indexer settings
#[derive(Debug, Clone)]
pub struct BulkIndexerConfig {
    /// Concurrent `_bulk` requests
    pub workers: usize,

    /// Encoded bytes per request before a new chunk starts
    pub flush_bytes: usize,
}

impl Default for BulkIndexerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            flush_bytes: DEFAULT_FLUSH_BYTES,
        }
    }
}

/// Counters for one bulk operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkIndexerStats {
    pub num_added: u64,
    pub num_flushed: u64,
    pub num_failed: u64,
    pub num_requests: u64,
}

/// Buffers documents and writes them in concurrent chunks
pub struct BulkIndexer {
    index: Arc<dyn SearchIndex>,
    config: BulkIndexerConfig,
    chunks: Vec<Vec<Value>>,
    current: Vec<Value>,
    current_bytes: usize,
    num_added: u64,
}

impl BulkIndexer {
    /// Create an indexer; fails on zero workers or a zero flush threshold
    pub fn new(index: Arc<dyn SearchIndex>, config: BulkIndexerConfig) -> SearchResult<Self> {
        if config.workers == 0 {
            return Err(SearchError::InvalidIndexer(
                "workers must be greater than 0".to_string(),
            ));
        }
        if config.flush_bytes == 0 {
            return Err(SearchError::InvalidIndexer(
                "flush_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            index,
            config,
            chunks: Vec::new(),
            current: Vec::new(),
            current_bytes: 0,
            num_added: 0,
        })
    }

    /// Encode and buffer one document
    pub fn add<T: Serialize>(&mut self, document: &T) -> SearchResult<()> {
        let value = serde_json::to_value(document)?;
        let size = serde_json::to_vec(&value)?.len();

        if !self.current.is_empty() && self.current_bytes + size > self.config.flush_bytes {
            self.chunks.push(std::mem::take(&mut self.current));
            self.current_bytes = 0;
        }

        self.current.push(value);
        self.current_bytes += size;
        self.num_added += 1;
        Ok(())
    }

    /// Number of documents buffered so far
    pub fn len(&self) -> u64 {
        self.num_added
    }

    pub fn is_empty(&self) -> bool {
        self.num_added == 0
    }

    /// Send all buffered documents and wait for every request
    ///
    /// Rejected documents are logged and counted. A request that fails as a
    /// whole makes the operation fail once all requests have completed.
    pub async fn close(mut self) -> SearchResult<BulkIndexerStats> {
        if !self.current.is_empty() {
            self.chunks.push(std::mem::take(&mut self.current));
        }

        let mut stats = BulkIndexerStats {
            num_added: self.num_added,
            ..BulkIndexerStats::default()
        };

        let index = self.index;
        let results: Vec<(usize, SearchResult<BulkResponse>)> = stream::iter(self.chunks)
            .map(|chunk| {
                let index = Arc::clone(&index);
                async move {
                    let len = chunk.len();
                    (len, index.bulk(chunk).await)
                }
            })
            .buffer_unordered(self.config.workers)
            .collect()
            .await;

        let mut first_error = None;
        for (len, result) in results {
            stats.num_requests += 1;
            match result {
                Ok(response) => {
                    let failed = record_item_failures(&response);
                    stats.num_failed += failed;
                    stats.num_flushed += (len as u64).saturating_sub(failed);
                }
                Err(e) => {
                    tracing::error!(documents = len, error = %e, "Bulk request failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }
}

fn record_item_failures(response: &BulkResponse) -> u64 {
    let mut failed = 0;
    for action in &response.items {
        let item = &action.index;
        if !item.is_failure() {
            continue;
        }
        failed += 1;
        match &item.error {
            Some(error) => tracing::error!(
                status = item.status,
                error_type = %error.kind,
                reason = %error.reason,
                "Failed to index document"
            ),
            None => tracing::error!(status = item.status, "Failed to index document"),
        }
    }
    failed
}
