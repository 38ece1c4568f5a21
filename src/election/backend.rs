//! Coordination backend abstraction
//!
//! The elector only needs four primitives from the coordination service.
//! Consensus, lease expiry and fencing are the backend's concern.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::error::ElectionResult;

/// Handle to a coordination session
///
/// A session owns whatever lease the backend uses to keep an elected
/// candidate's claim alive. Backends flag it as expired when that lease
/// is lost.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    expired: Arc<AtomicBool>,
}

impl Session {
    /// Create a session with a fresh random id
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    /// Create a session with a backend-assigned id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            expired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Session id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the backend has reported the lease as lost
    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::Acquire)
    }

    /// Flag the lease as lost
    pub fn mark_expired(&self) {
        self.expired.store(true, Ordering::Release);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Primitives consumed from a distributed coordination service
#[async_trait]
pub trait CoordinationBackend: Send + Sync {
    /// Open a new session
    async fn open_session(&self) -> ElectionResult<Session>;

    /// Block until `candidate` holds `election_key` under `session`
    ///
    /// Callers race this against their own cancellation signal.
    async fn campaign(
        &self,
        session: &Session,
        election_key: &str,
        candidate: &str,
    ) -> ElectionResult<()>;

    /// Give up `election_key` if `session` holds it
    async fn resign(&self, session: &Session, election_key: &str) -> ElectionResult<()>;

    /// Release the session and any lease attached to it
    async fn close_session(&self, session: Session) -> ElectionResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique() {
        let a = Session::new();
        let b = Session::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_expiry_is_shared_between_clones() {
        let session = Session::with_id("s-1");
        let clone = session.clone();
        assert!(!session.is_expired());

        clone.mark_expired();
        assert!(session.is_expired());
    }
}
