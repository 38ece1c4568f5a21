//! Common test utilities

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use yt_indexer::election::Elector;
use yt_indexer::models::VideoRecord;
use yt_indexer::search::{
    BulkAction, BulkItem, BulkItemError, BulkResponse, SearchError, SearchHits, SearchIndex,
    SearchResult,
};

/// In-memory search index recording every call
#[derive(Default)]
pub struct FakeIndex {
    pub bulk_requests: Mutex<Vec<Vec<Value>>>,
    pub queries: Mutex<Vec<Value>>,
    /// Documents with these `videoId`s come back rejected
    pub reject_video_ids: Vec<String>,
    /// Documents answered by `search`
    pub stored: Vec<VideoRecord>,
    pub fail_search: AtomicBool,
}

impl FakeIndex {
    pub fn with_rejections(ids: &[&str]) -> Self {
        Self {
            reject_video_ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_stored(stored: Vec<VideoRecord>) -> Self {
        Self {
            stored,
            ..Self::default()
        }
    }

    pub fn bulk_calls(&self) -> usize {
        self.bulk_requests.lock().unwrap().len()
    }

    pub fn indexed_documents(&self) -> Vec<Value> {
        self.bulk_requests
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn last_query(&self) -> Option<Value> {
        self.queries.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SearchIndex for FakeIndex {
    fn index_name(&self) -> &str {
        "test-videos"
    }

    async fn ping(&self) -> SearchResult<()> {
        Ok(())
    }

    async fn ensure_index(&self) -> SearchResult<()> {
        Ok(())
    }

    async fn bulk(&self, documents: Vec<Value>) -> SearchResult<BulkResponse> {
        let items = documents
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let rejected = doc["videoId"]
                    .as_str()
                    .is_some_and(|id| self.reject_video_ids.iter().any(|r| r == id));
                BulkAction {
                    index: BulkItem {
                        id: Some(format!("doc-{i}")),
                        status: if rejected { 400 } else { 201 },
                        error: rejected.then(|| BulkItemError {
                            kind: "mapper_parsing_exception".to_string(),
                            reason: "failed to parse field [publishTime]".to_string(),
                        }),
                    },
                }
            })
            .collect::<Vec<_>>();

        let errors = items.iter().any(|a| a.index.is_failure());
        self.bulk_requests.lock().unwrap().push(documents);

        Ok(BulkResponse {
            took: 1,
            errors,
            items,
        })
    }

    async fn search(&self, query: Value) -> SearchResult<SearchHits> {
        self.queries.lock().unwrap().push(query);
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(SearchError::status(503, "cluster unavailable"));
        }
        Ok(SearchHits {
            total: self.stored.len() as u64,
            items: self.stored.clone(),
        })
    }
}

/// Elector with a fixed leadership answer
#[derive(Default)]
pub struct FakeElector {
    pub leader: AtomicBool,
}

impl FakeElector {
    pub fn leading() -> Self {
        Self {
            leader: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl Elector for FakeElector {
    fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }

    fn campaign(&self) {}

    async fn resign(&self) {
        self.leader.store(false, Ordering::SeqCst);
    }
}

/// A search result item as the data API returns it
pub fn api_item(video_id: &str, title: &str) -> Value {
    json!({
        "kind": "youtube#searchResult",
        "id": { "kind": "youtube#video", "videoId": video_id },
        "snippet": {
            "publishedAt": "2024-01-15T10:00:00Z",
            "publishTime": "2024-01-15T10:00:00Z",
            "channelId": "UC_test",
            "channelTitle": "Test Channel",
            "title": title,
            "description": format!("About {title}"),
            "thumbnails": {
                "default": { "url": format!("https://i.ytimg.com/vi/{video_id}/default.jpg") }
            }
        }
    })
}

/// A full search list response with the given items
pub fn api_page(items: Vec<Value>) -> Value {
    json!({
        "kind": "youtube#searchListResponse",
        "nextPageToken": "CBkQAA",
        "regionCode": "US",
        "pageInfo": { "totalResults": items.len(), "resultsPerPage": 25 },
        "items": items
    })
}

/// Stored record with a given id and publish time
pub fn record(video_id: &str, publish_time: &str) -> VideoRecord {
    VideoRecord {
        title: format!("Video {video_id}"),
        description: "description".to_string(),
        thumbnail_url: format!("https://i.ytimg.com/vi/{video_id}/default.jpg"),
        channel_title: "Test Channel".to_string(),
        video_id: video_id.to_string(),
        publish_time: publish_time.to_string(),
        channel_id: "UC_test".to_string(),
    }
}
