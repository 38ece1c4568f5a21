//! Error types for the search module

use thiserror::Error;

/// Result type for search index operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Failures talking to the search index
#[derive(Error, Debug)]
pub enum SearchError {
    /// Client or transport could not be built
    #[error("invalid search client configuration: {0}")]
    Config(String),

    /// Bulk indexer settings are unusable
    #[error("invalid bulk indexer configuration: {0}")]
    InvalidIndexer(String),

    /// Request failed before a response was received
    #[error("search request failed: {0}")]
    Transport(#[from] opensearch::Error),

    /// Index answered with a non-success status
    #[error("search index returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("unexpected search response: {0}")]
    Response(String),

    /// Document could not be encoded
    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SearchError {
    /// Create a status error
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_recoverability() {
        assert!(SearchError::status(503, "unavailable").is_recoverable());
        assert!(SearchError::status(429, "too many requests").is_recoverable());
        assert!(!SearchError::status(400, "bad query").is_recoverable());
        assert!(!SearchError::Config("bad url".into()).is_recoverable());
    }
}
