//! Leader election for the write-side poller
//!
//! Every replica runs an elector, but only the one holding the election key
//! polls the external API. Leadership is exposed as a plain boolean that is
//! cheap to read on every scheduler tick.
//!
//! # State machine
//!
//! ```text
//!              campaign() ok
//!  Candidate ───────────────────▶ Leader
//!      ▲                            │
//!      └────────────────────────────┘
//!        resign() ok / lease expired
//! ```
//!
//! A separate `Idle`/`InProgress` flag prevents two campaign attempts from
//! running at once. Failed attempts are logged and abandoned; the caller
//! decides when to campaign again.
//!
//! # Backends
//!
//! - [`RedisBackend`] - lease key with `SET NX PX` and keepalive renewal
//! - [`StandaloneBackend`] - in-process, for single-replica deployments
//!
//! # Example
//!
//! ```ignore
//! use yt_indexer::election::{Elector, ElectorConfig, LeaderElector, StandaloneBackend};
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let backend = std::sync::Arc::new(StandaloneBackend::new());
//! let (elector, task) = LeaderElector::start(
//!     backend,
//!     ElectorConfig::new("yt-indexer/leader", "host-1"),
//!     shutdown_rx,
//! );
//! elector.campaign();
//! ```

pub mod backend;
pub mod elector;
pub mod error;
pub mod redis_backend;
pub mod standalone;

use async_trait::async_trait;

pub use backend::{CoordinationBackend, Session};
pub use elector::{ElectorConfig, LeaderElector};
pub use error::{ElectionError, ElectionResult};
pub use redis_backend::{RedisBackend, RedisBackendConfig};
pub use standalone::StandaloneBackend;

/// Leadership as seen by this replica
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LeadershipState {
    Candidate = 0,
    Leader = 1,
}

impl LeadershipState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Leader,
            _ => Self::Candidate,
        }
    }
}

/// Whether a campaign attempt is currently running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ElectionStatus {
    Idle = 0,
    InProgress = 1,
}

impl ElectionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::InProgress,
            _ => Self::Idle,
        }
    }
}

/// Leadership gate consulted by the scheduler
#[async_trait]
pub trait Elector: Send + Sync {
    /// True if this replica currently leads
    fn is_leader(&self) -> bool;

    /// Request a campaign attempt; no-op if leading or already campaigning
    fn campaign(&self);

    /// Give up leadership; errors are logged and leave the state unchanged
    async fn resign(&self);
}
