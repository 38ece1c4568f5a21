//! Errors that end an ingestion cycle

use thiserror::Error;

use crate::search::SearchError;

/// Result type for ingestion
pub type IngestResult<T> = Result<T, IngestError>;

/// Fatal ingestion failures
///
/// Quota exhaustion is not here: it rotates the key and completes the
/// cycle normally.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Request URL or HTTP client could not be built
    #[error("failed to build data API request: {0}")]
    RequestBuild(String),

    /// Request failed to send or its body could not be read
    #[error("data API request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Data API answered with an unexpected status
    #[error("unexpected data API response status: {status}")]
    Transport { status: u16 },

    /// Response body was not a search list response
    #[error("unable to decode data API response: {0}")]
    Decode(#[source] serde_json::Error),

    /// A record could not be encoded for indexing
    #[error("failed to encode record: {0}")]
    Encode(#[source] SearchError),

    /// Bulk indexer could not be created
    #[error("error creating the bulk indexer: {0}")]
    IndexerInit(#[source] SearchError),

    /// A bulk request failed as a whole
    #[error("failed to flush records to the search index: {0}")]
    IndexFlush(#[source] SearchError),
}

impl IngestError {
    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequestBuild(_) => "request_build",
            Self::Request(_) => "request",
            Self::Transport { .. } => "transport",
            Self::Decode(_) => "decode",
            Self::Encode(_) => "encode",
            Self::IndexerInit(_) => "indexer_init",
            Self::IndexFlush(_) => "index_flush",
        }
    }

    /// Whether a later cycle could succeed without intervention
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Transport { status } => *status == 429 || *status >= 500,
            Self::IndexFlush(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_message_and_kind() {
        let err = IngestError::Transport { status: 500 };
        assert_eq!(err.to_string(), "unexpected data API response status: 500");
        assert_eq!(err.kind(), "transport");
        assert!(err.is_recoverable());
        assert!(!IngestError::Transport { status: 400 }.is_recoverable());
    }

    #[test]
    fn test_indexer_init_not_recoverable() {
        let err = IngestError::IndexerInit(SearchError::InvalidIndexer("workers".into()));
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("bulk indexer"));
    }
}
