//! In-process coordination backend
//!
//! Used for single-replica deployments and local development where no
//! Redis is available. Every elector sharing one `StandaloneBackend`
//! competes for the same keys, so it also models a small fleet in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

use super::backend::{CoordinationBackend, Session};
use super::error::{ElectionError, ElectionResult};

#[derive(Debug, Clone)]
struct Holder {
    session_id: String,
    candidate: String,
}

/// Process-local election backend
#[derive(Debug, Default)]
pub struct StandaloneBackend {
    holders: Mutex<HashMap<String, Holder>>,
    released: Notify,
    sessions_opened: AtomicUsize,
}

impl StandaloneBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidate currently holding `election_key`
    pub fn leader(&self, election_key: &str) -> Option<String> {
        self.holders
            .lock()
            .ok()?
            .get(election_key)
            .map(|h| h.candidate.clone())
    }

    /// Total sessions opened since creation
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::Relaxed)
    }

    fn release_session(&self, session_id: &str) -> ElectionResult<bool> {
        let mut holders = self
            .holders
            .lock()
            .map_err(|_| ElectionError::Session("holder table poisoned".to_string()))?;
        let before = holders.len();
        holders.retain(|_, h| h.session_id != session_id);
        Ok(holders.len() != before)
    }
}

#[async_trait]
impl CoordinationBackend for StandaloneBackend {
    async fn open_session(&self) -> ElectionResult<Session> {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        Ok(Session::new())
    }

    async fn campaign(
        &self,
        session: &Session,
        election_key: &str,
        candidate: &str,
    ) -> ElectionResult<()> {
        loop {
            // Registered before the check so a release between the check
            // and the await still wakes us.
            let released = self.released.notified();
            {
                let mut holders = self
                    .holders
                    .lock()
                    .map_err(|_| ElectionError::campaign(election_key, "holder table poisoned"))?;

                match holders.get(election_key) {
                    Some(h) if h.session_id == session.id() => return Ok(()),
                    Some(_) => {}
                    None => {
                        holders.insert(
                            election_key.to_string(),
                            Holder {
                                session_id: session.id().to_string(),
                                candidate: candidate.to_string(),
                            },
                        );
                        return Ok(());
                    }
                }
            }
            released.await;
        }
    }

    async fn resign(&self, session: &Session, election_key: &str) -> ElectionResult<()> {
        let removed = {
            let mut holders = self
                .holders
                .lock()
                .map_err(|_| ElectionError::resign(election_key, "holder table poisoned"))?;
            match holders.get(election_key) {
                Some(h) if h.session_id == session.id() => holders.remove(election_key).is_some(),
                _ => false,
            }
        };

        if removed {
            self.released.notify_waiters();
        }
        Ok(())
    }

    async fn close_session(&self, session: Session) -> ElectionResult<()> {
        if self.release_session(session.id())? {
            self.released.notify_waiters();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    const KEY: &str = "test/leader";

    #[tokio::test]
    async fn test_first_campaign_wins() {
        let backend = StandaloneBackend::new();
        let session = backend.open_session().await.unwrap();

        backend.campaign(&session, KEY, "node-a").await.unwrap();

        assert_eq!(backend.leader(KEY).as_deref(), Some("node-a"));
        assert_eq!(backend.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn test_second_campaign_blocks_until_resign() {
        let backend = Arc::new(StandaloneBackend::new());
        let first = backend.open_session().await.unwrap();
        backend.campaign(&first, KEY, "node-a").await.unwrap();

        let second = backend.open_session().await.unwrap();
        let contender = {
            let backend = backend.clone();
            let second = second.clone();
            tokio::spawn(async move { backend.campaign(&second, KEY, "node-b").await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        backend.resign(&first, KEY).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should be elected after resign")
            .unwrap()
            .unwrap();

        assert_eq!(backend.leader(KEY).as_deref(), Some("node-b"));
    }

    #[tokio::test]
    async fn test_close_session_releases_keys() {
        let backend = StandaloneBackend::new();
        let session = backend.open_session().await.unwrap();
        backend.campaign(&session, KEY, "node-a").await.unwrap();

        backend.close_session(session).await.unwrap();
        assert!(backend.leader(KEY).is_none());
    }

    #[tokio::test]
    async fn test_resign_by_non_holder_is_noop() {
        let backend = StandaloneBackend::new();
        let holder = backend.open_session().await.unwrap();
        let other = backend.open_session().await.unwrap();
        backend.campaign(&holder, KEY, "node-a").await.unwrap();

        backend.resign(&other, KEY).await.unwrap();
        assert_eq!(backend.leader(KEY).as_deref(), Some("node-a"));
    }
}
