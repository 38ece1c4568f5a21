//! Wire format of the data API search list response

use serde::Deserialize;

use crate::models::VideoRecord;

/// Body of a successful search request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchListResponse {
    pub kind: String,
    pub region_code: String,
    pub page_info: PageInfo,
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageInfo {
    pub total_results: u64,
    pub results_per_page: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchItem {
    pub id: ItemId,
    pub snippet: Snippet,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ItemId {
    pub kind: String,
    pub video_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Snippet {
    pub published_at: String,
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub thumbnails: Thumbnails,
    pub channel_title: String,
    pub publish_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Thumbnails {
    pub default: Thumbnail,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Thumbnail {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl From<SearchItem> for VideoRecord {
    fn from(item: SearchItem) -> Self {
        let snippet = item.snippet;
        Self {
            title: snippet.title,
            description: snippet.description,
            thumbnail_url: snippet.thumbnails.default.url,
            channel_title: snippet.channel_title,
            video_id: item.id.video_id,
            publish_time: snippet.publish_time,
            channel_id: snippet.channel_id,
        }
    }
}

impl SearchListResponse {
    /// Flatten every item into an index record, preserving order
    pub fn into_records(self) -> Vec<VideoRecord> {
        self.items.into_iter().map(VideoRecord::from).collect()
    }
}
