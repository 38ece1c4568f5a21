//! Unified error handling for the yt-indexer crate
//!
//! Each module defines its own error enum. [`Error`] wraps all of them so
//! the service can carry any fatal failure on a single channel.
//!
//! # Architecture
//!
//! - [`IndexerErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use yt_indexer::error::{Error, IndexerErrorTrait};
//!
//! fn report(err: &Error) {
//!     tracing::error!(category = ?err.category(), recoverable = err.is_recoverable(), "{err}");
//! }
//! ```

use thiserror::Error;

pub use crate::election::ElectionError;
pub use crate::ingest::IngestError;
pub use crate::keystore::KeyStoreError;
pub use crate::search::SearchError;

/// Common interface for error classification
pub trait IndexerErrorTrait: std::error::Error {
    /// Whether retrying the failed operation later could succeed
    fn is_recoverable(&self) -> bool;

    fn category(&self) -> ErrorCategory;
}

/// Broad error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Data API or HTTP transport
    Network,
    /// Response decoding or record encoding
    Parsing,
    /// Search index
    Storage,
    /// Leader election backend
    Coordination,
    Config,
    Other,
}

/// Unified error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    #[error("Election error: {0}")]
    Election(#[from] ElectionError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl IndexerErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::KeyStore(_) => false,
            Self::Election(e) => e.is_recoverable(),
            Self::Ingest(e) => e.is_recoverable(),
            Self::Search(e) => e.is_recoverable(),
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::KeyStore(_) | Self::Config(_) => ErrorCategory::Config,
            Self::Election(_) => ErrorCategory::Coordination,
            Self::Ingest(e) => match e {
                IngestError::RequestBuild(_)
                | IngestError::Request(_)
                | IngestError::Transport { .. } => ErrorCategory::Network,
                IngestError::Decode(_) | IngestError::Encode(_) => ErrorCategory::Parsing,
                IngestError::IndexerInit(_) | IngestError::IndexFlush(_) => ErrorCategory::Storage,
            },
            Self::Search(_) => ErrorCategory::Storage,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Configuration rejected before any component was built
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let err = Error::from(IngestError::Transport { status: 500 });
        assert_eq!(err.category(), ErrorCategory::Network);

        let err = Error::from(IngestError::IndexerInit(SearchError::InvalidIndexer(
            "workers".into(),
        )));
        assert_eq!(err.category(), ErrorCategory::Storage);

        let err = Error::from(KeyStoreError::EmptyPool);
        assert_eq!(err.category(), ErrorCategory::Config);

        let err = Error::from(ElectionError::Session("refused".into()));
        assert_eq!(err.category(), ErrorCategory::Coordination);
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::from(IngestError::Transport { status: 503 }).is_recoverable());
        assert!(!Error::from(IngestError::Transport { status: 404 }).is_recoverable());
        assert!(!Error::from(KeyStoreError::EmptyPool).is_recoverable());
        assert!(!Error::config("missing keys").is_recoverable());
    }

    #[test]
    fn test_display_includes_domain() {
        let err = Error::from(IngestError::Transport { status: 500 });
        assert_eq!(
            err.to_string(),
            "Ingestion error: unexpected data API response status: 500"
        );
    }

    #[test]
    fn test_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let err = Error::with_source("failed to bind read API", io);
        assert_eq!(err.to_string(), "failed to bind read API");
        assert!(std::error::Error::source(&err).is_some());
    }
}
