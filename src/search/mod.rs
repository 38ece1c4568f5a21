//! Search index access: bulk writes and the two read queries
//!
//! The index is OpenSearch (Elasticsearch-compatible). Writers go through
//! [`BulkIndexer`], readers build a query with [`search_all_query`] or
//! [`match_query`] and decode the hits into [`SearchHits`].

pub mod bulk;
pub mod client;
pub mod error;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::models::{SearchPage, VideoRecord};

pub use bulk::{BulkIndexer, BulkIndexerConfig, BulkIndexerStats};
pub use client::OpenSearchIndex;
pub use error::{SearchError, SearchResult};

/// Page size used when the caller does not ask for one
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Operations the service needs from a search index
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Name of the target index
    fn index_name(&self) -> &str;

    /// Check the cluster is reachable
    async fn ping(&self) -> SearchResult<()>;

    /// Create the index with its mapping if it does not exist
    async fn ensure_index(&self) -> SearchResult<()>;

    /// Submit one `_bulk` request indexing `documents` in order
    async fn bulk(&self, documents: Vec<Value>) -> SearchResult<BulkResponse>;

    /// Run a query body against the index
    async fn search(&self, query: Value) -> SearchResult<SearchHits>;
}

/// Decoded `_bulk` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<BulkAction>,
}

/// One entry of `items[]`, keyed by the action that produced it
#[derive(Debug, Clone, Deserialize)]
pub struct BulkAction {
    #[serde(alias = "create")]
    pub index: BulkItem,
}

/// Outcome of a single document in a bulk request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkItem {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: Option<BulkItemError>,
}

impl BulkItem {
    /// Whether this document was rejected
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.status >= 300
    }
}

/// Per-document failure detail
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkItemError {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub reason: String,
}

/// Decoded hits of a `_search` response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    pub total: u64,
    pub items: Vec<VideoRecord>,
}

impl SearchHits {
    /// Decode `hits.total.value` and `hits.hits[]._source`
    pub fn from_response(body: Value) -> SearchResult<Self> {
        let raw: RawSearchResponse =
            serde_json::from_value(body).map_err(|e| SearchError::Response(e.to_string()))?;

        let total = match raw.hits.total {
            Some(RawTotal::Object { value }) => value,
            Some(RawTotal::Count(value)) => value,
            None => 0,
        };

        Ok(Self {
            total,
            items: raw.hits.hits.into_iter().map(|h| h.source).collect(),
        })
    }
}

impl From<SearchHits> for SearchPage {
    fn from(hits: SearchHits) -> Self {
        Self {
            total_count: hits.total,
            items: hits.items,
        }
    }
}

#[derive(Deserialize)]
struct RawSearchResponse {
    hits: RawHits,
}

#[derive(Deserialize)]
struct RawHits {
    #[serde(default)]
    total: Option<RawTotal>,
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTotal {
    Object { value: u64 },
    Count(u64),
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_source")]
    source: VideoRecord,
}

/// Every document, newest first
pub fn search_all_query(from: usize, size: usize) -> Value {
    json!({
        "query": { "match_all": {} },
        "sort": [ { "publishTime": { "order": "desc" } } ],
        "track_total_hits": true,
        "from": from,
        "size": size
    })
}

/// Full-text match on title (double weight) and description
pub fn match_query(q: &str) -> Value {
    json!({
        "query": {
            "multi_match": {
                "query": q,
                "fields": ["title^2", "description"]
            }
        }
    })
}

/// Mapping applied when the index is created
pub fn index_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "title": { "type": "text" },
                "description": { "type": "text" },
                "thumbnails": { "type": "keyword", "index": false },
                "channelTitle": { "type": "text" },
                "videoId": { "type": "keyword" },
                "publishTime": { "type": "date" },
                "channelId": { "type": "keyword" }
            }
        }
    })
}
