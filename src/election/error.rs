//! Error types for the election module

use thiserror::Error;

/// Result type for election operations
pub type ElectionResult<T> = Result<T, ElectionError>;

/// Failures reported by a coordination backend
///
/// None of these are fatal to the process: the elector logs them and
/// returns to `Idle`, waiting for the next explicit campaign.
#[derive(Error, Debug)]
pub enum ElectionError {
    /// Could not open a session with the coordination service
    #[error("failed to open election session: {0}")]
    Session(String),

    /// The blocking campaign call failed
    #[error("campaign for '{key}' failed: {reason}")]
    Campaign { key: String, reason: String },

    /// Releasing the election key failed
    #[error("failed to resign from '{key}': {reason}")]
    Resign { key: String, reason: String },

    /// Closing the session failed
    #[error("failed to close election session {id}: {reason}")]
    CloseSession { id: String, reason: String },

    /// Transport or protocol failure talking to the backend
    #[error("coordination backend error: {0}")]
    Backend(#[from] redis::RedisError),
}

impl ElectionError {
    /// Create a campaign error
    pub fn campaign(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Campaign {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a resign error
    pub fn resign(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resign {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a close-session error
    pub fn close_session(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CloseSession {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Election failures are always retried by a later campaign
    pub fn is_recoverable(&self) -> bool {
        true
    }
}
