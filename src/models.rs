//! Core data structures for yt-indexer

use serde::{Deserialize, Serialize};

/// Flat projection of one video search result, stored as one index document
///
/// The JSON field names are the index field names the read queries sort
/// and match on (`publishTime`, `title`, `description`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VideoRecord {
    pub title: String,
    pub description: String,
    /// Default thumbnail URL
    #[serde(rename = "thumbnails")]
    pub thumbnail_url: String,
    #[serde(rename = "channelTitle")]
    pub channel_title: String,
    #[serde(rename = "videoId")]
    pub video_id: String,
    /// RFC 3339 publish time as reported by the provider
    #[serde(rename = "publishTime")]
    pub publish_time: String,
    #[serde(rename = "channelId")]
    pub channel_id: String,
}

/// Response body of both read endpoints
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchPage {
    pub total_count: u64,
    pub items: Vec<VideoRecord>,
}
