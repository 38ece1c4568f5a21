//! Leadership state machine driven by a dedicated election task

use async_trait::async_trait;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use super::backend::{CoordinationBackend, Session};
use super::{ElectionStatus, Elector, LeadershipState};
use crate::metrics;
use crate::utils::wait_for_shutdown;

/// Floor for the lease check period; a zero period would panic the task
const MIN_LEASE_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Identity and key used when campaigning
#[derive(Debug, Clone)]
pub struct ElectorConfig {
    /// Well-known key all replicas campaign on
    pub election_key: String,

    /// Value this replica campaigns with (usually the hostname)
    pub candidate_id: String,

    /// How often the loop checks whether a held lease has expired
    pub lease_check_interval: Duration,
}

impl ElectorConfig {
    /// Create a config with the default lease check interval
    pub fn new(election_key: impl Into<String>, candidate_id: impl Into<String>) -> Self {
        Self {
            election_key: election_key.into(),
            candidate_id: candidate_id.into(),
            lease_check_interval: Duration::from_secs(1),
        }
    }
}

struct Shared {
    leadership: AtomicU8,
    election: AtomicU8,
    /// Session backing the current leadership, if any
    session: Mutex<Option<Session>>,
}

impl Shared {
    fn leadership(&self) -> LeadershipState {
        LeadershipState::from_u8(self.leadership.load(Ordering::Acquire))
    }

    fn election(&self) -> ElectionStatus {
        ElectionStatus::from_u8(self.election.load(Ordering::Acquire))
    }

    fn set_leadership(&self, state: LeadershipState) {
        self.leadership.store(state as u8, Ordering::Release);
        metrics::set_leader(state == LeadershipState::Leader);
    }

    fn set_election(&self, status: ElectionStatus) {
        self.election.store(status as u8, Ordering::Release);
    }
}

/// Elector backed by a [`CoordinationBackend`]
///
/// `campaign` only signals the election task; the task opens a session and
/// performs the blocking campaign call. Leadership and election status are
/// two independent atomics: a reader may briefly observe `Leader` together
/// with `InProgress` while an attempt is completing.
pub struct LeaderElector {
    shared: Arc<Shared>,
    backend: Arc<dyn CoordinationBackend>,
    config: ElectorConfig,
    start_tx: mpsc::Sender<()>,
}

impl LeaderElector {
    /// Create the elector and spawn its election task
    ///
    /// The task exits when `shutdown` flips to `true` (or its sender is
    /// dropped), closing any session it still holds.
    pub fn start(
        backend: Arc<dyn CoordinationBackend>,
        config: ElectorConfig,
        shutdown: watch::Receiver<bool>,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let shared = Arc::new(Shared {
            leadership: AtomicU8::new(LeadershipState::Candidate as u8),
            election: AtomicU8::new(ElectionStatus::Idle as u8),
            session: Mutex::new(None),
        });
        let (start_tx, start_rx) = mpsc::channel(1);

        let task = ElectionTask {
            shared: shared.clone(),
            backend: backend.clone(),
            config: config.clone(),
            start_rx,
            shutdown,
        };
        let handle = tokio::spawn(task.run());

        let elector = Arc::new(Self {
            shared,
            backend,
            config,
            start_tx,
        });
        (elector, handle)
    }

    /// Current leadership state
    pub fn leadership(&self) -> LeadershipState {
        self.shared.leadership()
    }

    /// Whether a campaign attempt is running
    pub fn election_status(&self) -> ElectionStatus {
        self.shared.election()
    }
}

#[async_trait]
impl Elector for LeaderElector {
    fn is_leader(&self) -> bool {
        self.shared.leadership() == LeadershipState::Leader
    }

    fn campaign(&self) {
        if self.is_leader() {
            return;
        }

        // Idle -> InProgress claims the attempt; a concurrent caller loses
        if self
            .shared
            .election
            .compare_exchange(
                ElectionStatus::Idle as u8,
                ElectionStatus::InProgress as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }

        if let Err(e) = self.start_tx.try_send(()) {
            tracing::warn!(error = %e, "Election task unavailable, campaign dropped");
            self.shared.set_election(ElectionStatus::Idle);
        }
    }

    async fn resign(&self) {
        if !self.is_leader() {
            return;
        }

        let mut guard = self.shared.session.lock().await;
        let Some(session) = guard.as_ref() else {
            return;
        };

        if let Err(e) = self
            .backend
            .resign(session, &self.config.election_key)
            .await
        {
            tracing::error!(error = %e, "Failed to resign from the leadership status");
            return;
        }

        if let Some(session) = guard.as_ref() {
            if let Err(e) = self.backend.close_session(session.clone()).await {
                tracing::error!(error = %e, "Failed to close the current election session");
                return;
            }
        }
        guard.take();

        self.shared.set_election(ElectionStatus::Idle);
        self.shared.set_leadership(LeadershipState::Candidate);
        tracing::info!(candidate = %self.config.candidate_id, "Resigned leadership");
    }
}

/// The dedicated election-processing loop
struct ElectionTask {
    shared: Arc<Shared>,
    backend: Arc<dyn CoordinationBackend>,
    config: ElectorConfig,
    start_rx: mpsc::Receiver<()>,
    shutdown: watch::Receiver<bool>,
}

impl ElectionTask {
    async fn run(mut self) {
        let period = self.config.lease_check_interval.max(MIN_LEASE_CHECK_INTERVAL);
        let mut lease_check = tokio::time::interval(period);
        lease_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                request = self.start_rx.recv() => {
                    if request.is_none() {
                        break;
                    }
                    if !self.run_election().await {
                        break;
                    }
                }
                _ = lease_check.tick() => {
                    self.check_lease().await;
                }
            }
        }

        self.cleanup().await;
        tracing::debug!("Election task stopped");
    }

    /// One campaign attempt. Returns false if shutdown interrupted it.
    async fn run_election(&mut self) -> bool {
        tracing::debug!("Initiating a new session for leader election");

        let session = match self.backend.open_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "Error while continuing leader election");
                self.shared.set_election(ElectionStatus::Idle);
                return true;
            }
        };

        let key = self.config.election_key.clone();
        let candidate = self.config.candidate_id.clone();
        let outcome = tokio::select! {
            result = self.backend.campaign(&session, &key, &candidate) => Some(result),
            _ = wait_for_shutdown(&mut self.shutdown) => None,
        };

        match outcome {
            Some(Ok(())) => {
                *self.shared.session.lock().await = Some(session);
                self.shared.set_leadership(LeadershipState::Leader);
                self.shared.set_election(ElectionStatus::Idle);
                tracing::info!(candidate = %candidate, key = %key, "Current node is the leader");
                true
            }
            Some(Err(e)) => {
                tracing::error!(
                    error = %e,
                    "Failed to elect leader through blocking campaign call"
                );
                self.close(session).await;
                self.shared.set_election(ElectionStatus::Idle);
                true
            }
            None => {
                self.close(session).await;
                self.shared.set_election(ElectionStatus::Idle);
                false
            }
        }
    }

    /// Step down if the backend reported the held lease as lost
    async fn check_lease(&self) {
        if self.shared.leadership() != LeadershipState::Leader {
            return;
        }

        let mut guard = self.shared.session.lock().await;
        let expired = guard.as_ref().is_some_and(Session::is_expired);
        if !expired {
            return;
        }

        tracing::warn!(
            candidate = %self.config.candidate_id,
            "Election lease expired, stepping down"
        );
        if let Some(session) = guard.take() {
            self.close(session).await;
        }
        self.shared.set_leadership(LeadershipState::Candidate);
        self.shared.set_election(ElectionStatus::Idle);
    }

    async fn cleanup(&self) {
        if let Some(session) = self.shared.session.lock().await.take() {
            self.close(session).await;
        }
        self.shared.set_leadership(LeadershipState::Candidate);
        self.shared.set_election(ElectionStatus::Idle);
    }

    async fn close(&self, session: Session) {
        if let Err(e) = self.backend.close_session(session).await {
            tracing::error!(error = %e, "Failed to close election session");
        }
    }
}
