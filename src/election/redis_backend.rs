//! Redis lease-based coordination backend
//!
//! A candidate is elected by creating the election key with `SET NX PX`.
//! The value is `{candidate}/{session_id}`, so only the owning session can
//! renew or delete it. A keepalive task refreshes the TTL every third of
//! the lease; if the key is gone or owned by someone else, or no renewal
//! has succeeded for a whole TTL, the session is flagged as expired.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::backend::{CoordinationBackend, Session};
use super::error::{ElectionError, ElectionResult};

const RENEW_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("PEXPIRE", KEYS[1], ARGV[2])
else
    return 0
end
"#;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Settings for [`RedisBackend`]
#[derive(Debug, Clone)]
pub struct RedisBackendConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,

    /// Lease TTL applied to the election key
    pub lease_ttl: Duration,

    /// Delay between `SET NX` attempts while another candidate leads
    pub campaign_retry: Duration,
}

impl Default for RedisBackendConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            lease_ttl: Duration::from_secs(60),
            campaign_retry: Duration::from_millis(500),
        }
    }
}

struct Lease {
    key: String,
    value: String,
    keepalive: JoinHandle<()>,
}

/// Election backend on a single Redis primary
pub struct RedisBackend {
    conn: ConnectionManager,
    config: RedisBackendConfig,
    leases: Mutex<HashMap<String, Lease>>,
}

impl RedisBackend {
    /// Connect to Redis and verify the connection with `PING`
    pub async fn connect(config: RedisBackendConfig) -> ElectionResult<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let mut conn = ConnectionManager::new(client).await?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        tracing::info!(url = %config.url, "Connected to Redis coordination backend");

        Ok(Self {
            conn,
            config,
            leases: Mutex::new(HashMap::new()),
        })
    }

    fn lease_value(session: &Session, candidate: &str) -> String {
        format!("{candidate}/{}", session.id())
    }

    fn ttl_millis(&self) -> u64 {
        self.config.lease_ttl.as_millis().max(1) as u64
    }

    fn spawn_keepalive(&self, session: Session, key: String, value: String) -> JoinHandle<()> {
        let mut conn = self.conn.clone();
        let ttl_ms = self.ttl_millis();
        let ttl = self.config.lease_ttl;
        let period = (ttl / 3).max(Duration::from_millis(100));

        tokio::spawn(async move {
            let script = redis::Script::new(RENEW_SCRIPT);
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // first tick completes immediately; the key was just written
            ticker.tick().await;
            let mut last_renewed = Instant::now();

            loop {
                ticker.tick().await;
                let attempted = Instant::now();
                let renewed: Result<i64, _> = script
                    .key(&key)
                    .arg(&value)
                    .arg(ttl_ms)
                    .invoke_async(&mut conn)
                    .await;

                match renewed {
                    Ok(1) => {
                        last_renewed = attempted;
                        tracing::trace!(key = %key, "Election lease renewed");
                    }
                    Ok(_) => {
                        tracing::warn!(key = %key, session = %session.id(), "Election lease lost");
                        session.mark_expired();
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Failed to renew election lease");
                        if lease_outlived(last_renewed, Instant::now(), ttl) {
                            tracing::warn!(
                                key = %key,
                                session = %session.id(),
                                "No renewal within the lease TTL, assuming the lease is lost"
                            );
                            session.mark_expired();
                            return;
                        }
                    }
                }
            }
        })
    }

    fn take_lease(&self, session_id: &str) -> Option<Lease> {
        self.leases.lock().ok()?.remove(session_id)
    }
}

#[async_trait]
impl CoordinationBackend for RedisBackend {
    async fn open_session(&self) -> ElectionResult<Session> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| ElectionError::Session(e.to_string()))?;
        Ok(Session::new())
    }

    async fn campaign(
        &self,
        session: &Session,
        election_key: &str,
        candidate: &str,
    ) -> ElectionResult<()> {
        let value = Self::lease_value(session, candidate);
        let ttl_ms = self.ttl_millis();
        let mut conn = self.conn.clone();

        loop {
            let acquired: Option<String> = redis::cmd("SET")
                .arg(election_key)
                .arg(&value)
                .arg("NX")
                .arg("PX")
                .arg(ttl_ms)
                .query_async(&mut conn)
                .await
                .map_err(|e| ElectionError::campaign(election_key, e.to_string()))?;

            if acquired.is_some() {
                let keepalive =
                    self.spawn_keepalive(session.clone(), election_key.to_string(), value.clone());
                let lease = Lease {
                    key: election_key.to_string(),
                    value,
                    keepalive,
                };
                let mut leases = self
                    .leases
                    .lock()
                    .map_err(|_| ElectionError::campaign(election_key, "lease table poisoned"))?;
                leases.insert(session.id().to_string(), lease);
                return Ok(());
            }

            tracing::trace!(key = %election_key, "Election key held elsewhere, retrying");
            tokio::time::sleep(self.config.campaign_retry).await;
        }
    }

    async fn resign(&self, session: &Session, election_key: &str) -> ElectionResult<()> {
        let value = {
            let leases = self
                .leases
                .lock()
                .map_err(|_| ElectionError::resign(election_key, "lease table poisoned"))?;
            match leases.get(session.id()) {
                Some(lease) if lease.key == election_key => lease.value.clone(),
                _ => return Ok(()),
            }
        };

        let mut conn = self.conn.clone();
        let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(election_key)
            .arg(&value)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| ElectionError::resign(election_key, e.to_string()))?;

        if deleted == 0 {
            tracing::debug!(key = %election_key, "Election key already released or expired");
        }

        if let Some(lease) = self.take_lease(session.id()) {
            lease.keepalive.abort();
        }
        Ok(())
    }

    async fn close_session(&self, session: Session) -> ElectionResult<()> {
        let (key, value) = {
            let leases = self
                .leases
                .lock()
                .map_err(|_| ElectionError::close_session(session.id(), "lease table poisoned"))?;
            match leases.get(session.id()) {
                Some(lease) => (lease.key.clone(), lease.value.clone()),
                None => return Ok(()),
            }
        };

        // Closing a session revokes its lease, like an etcd lease revoke.
        // The lease stays registered until the release lands so a retry can repeat it.
        let mut conn = self.conn.clone();
        let _: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(&key)
            .arg(&value)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| ElectionError::close_session(session.id(), e.to_string()))?;

        if let Some(lease) = self.take_lease(session.id()) {
            lease.keepalive.abort();
        }
        Ok(())
    }
}

/// Whether a lease last renewed at `last_renewed` has expired server-side
///
/// `last_renewed` is taken before the renewal was sent, so the local
/// deadline never trails the one Redis applies.
fn lease_outlived(last_renewed: Instant, now: Instant, ttl: Duration) -> bool {
    now.saturating_duration_since(last_renewed) >= ttl
}
