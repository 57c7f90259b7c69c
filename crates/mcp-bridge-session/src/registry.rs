use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mcp_bridge_supervisor::HandleId;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::SessionError;
use crate::session::{Session, SessionId};

/// Aggregate counters exposed by the `/stats` collaborator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub initialized: usize,
    pub active_last_60s: usize,
    pub attached_sse: usize,
    pub average_queue_len: f64,
}

/// Owns every live [`Session`], indexed by its own id and by the
/// [`HandleId`] of the subprocess it is bound to. The handle index lets the
/// Proxy Core resolve "which session does this supervisor event belong to"
/// without the supervisor knowing sessions exist.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    by_handle: RwLock<HashMap<HandleId, SessionId>>,
    max_sessions: usize,
    session_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize, session_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            by_handle: RwLock::new(HashMap::new()),
            max_sessions,
            session_timeout,
        }
    }

    /// Allocates a session under a caller-chosen id, bound to `handle_id`.
    /// If the registry is at capacity, sweeps expired sessions once before
    /// giving up with [`SessionError::ResourceExhausted`].
    ///
    /// The id is caller-chosen (rather than generated here) so the Proxy
    /// Core can derive the subprocess handle id from it and spawn the
    /// subprocess under the same name used to register the session,
    /// destroying the session it just created if that spawn fails.
    pub async fn create(
        &self,
        id: SessionId,
        server_name: impl Into<String>,
        handle_id: HandleId,
    ) -> Result<Arc<Session>, SessionError> {
        if self.sessions.read().await.len() >= self.max_sessions {
            self.sweep_expired().await;
            if self.sessions.read().await.len() >= self.max_sessions {
                return Err(SessionError::ResourceExhausted(self.max_sessions));
            }
        }

        let session = Arc::new(Session::new(id.clone(), server_name.into(), handle_id.clone()));
        self.sessions.write().await.insert(id.clone(), session.clone());
        self.by_handle.write().await.insert(handle_id, id.clone());
        debug!(session = %id, "session created");
        Ok(session)
    }

    /// Looks up a session by id. Lazily evicts and returns `None` if it has
    /// expired; otherwise refreshes its activity clock.
    pub async fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        let session = self.sessions.read().await.get(id).cloned()?;
        if session.is_expired(self.session_timeout).await {
            self.destroy(id).await;
            return None;
        }
        session.touch().await;
        Some(session)
    }

    /// Resolves the session bound to a supervisor handle, without touching
    /// its activity clock (used on the subprocess-stdout path, not the
    /// client-request path).
    pub async fn get_by_handle(&self, handle_id: &HandleId) -> Option<Arc<Session>> {
        let id = self.by_handle.read().await.get(handle_id).cloned()?;
        self.sessions.read().await.get(&id).cloned()
    }

    /// Destroys a session: closes its SSE streams, clears its queue, fails
    /// its waiters, and removes both index entries. Idempotent — destroying
    /// an already-gone session is a no-op that returns `None`.
    pub async fn destroy(&self, id: &SessionId) -> Option<Arc<Session>> {
        let session = self.sessions.write().await.remove(id)?;
        self.by_handle.write().await.remove(&session.handle_id);
        session.shutdown().await;
        info!(session = %id, "session destroyed");
        Some(session)
    }

    pub async fn sweep_expired(&self) {
        let expired: Vec<SessionId> = {
            let mut expired = Vec::new();
            for (id, session) in self.sessions.read().await.iter() {
                if session.is_expired(self.session_timeout).await {
                    expired.push(id.clone());
                }
            }
            expired
        };
        for id in expired {
            self.destroy(&id).await;
        }
    }

    /// Spawns a background task that sweeps expired sessions on a timer,
    /// `min(60s, sessionTimeout / 2)` per the registry's sweep contract.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        let interval = std::cmp::min(Duration::from_secs(60), self.session_timeout / 2);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            loop {
                ticker.tick().await;
                registry.sweep_expired().await;
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Snapshot of every live session id, used by graceful shutdown.
    pub async fn all_ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().cloned().collect()
    }

    pub async fn stats(&self) -> RegistryStats {
        let sessions = self.sessions.read().await;
        let total = sessions.len();
        let mut initialized = 0;
        let mut active_last_60s = 0;
        let mut attached_sse = 0;
        let mut queue_total = 0usize;
        for session in sessions.values() {
            if session.is_initialized().await {
                initialized += 1;
            }
            if session.idle_for().await < Duration::from_secs(60) {
                active_last_60s += 1;
            }
            attached_sse += session.attached_count().await;
            queue_total += session.queue_len().await;
        }
        RegistryStats {
            total,
            initialized,
            active_last_60s,
            attached_sse,
            average_queue_len: if total == 0 {
                0.0
            } else {
                queue_total as f64 / total as f64
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(n: &str) -> HandleId {
        HandleId(n.to_string())
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let registry = SessionRegistry::new(10, Duration::from_secs(3600));
        let session = registry.create(SessionId::generate(), "echo", handle("h1")).await.unwrap();
        let fetched = registry.get(&session.id).await.unwrap();
        assert_eq!(fetched.id, session.id);
    }

    #[tokio::test]
    async fn get_by_handle_resolves_the_bound_session() {
        let registry = SessionRegistry::new(10, Duration::from_secs(3600));
        let session = registry.create(SessionId::generate(), "echo", handle("h2")).await.unwrap();
        let fetched = registry.get_by_handle(&handle("h2")).await.unwrap();
        assert_eq!(fetched.id, session.id);
    }

    #[tokio::test]
    async fn resource_exhausted_when_at_capacity() {
        let registry = SessionRegistry::new(1, Duration::from_secs(3600));
        registry.create(SessionId::generate(), "echo", handle("h3")).await.unwrap();
        let err = registry.create(SessionId::generate(), "echo", handle("h4")).await.unwrap_err();
        assert!(matches!(err, SessionError::ResourceExhausted(1)));
    }

    #[tokio::test]
    async fn expired_session_is_evicted_on_get() {
        let registry = SessionRegistry::new(10, Duration::from_millis(1));
        let session = registry.create(SessionId::generate(), "echo", handle("h5")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(registry.get(&session.id).await.is_none());
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let registry = SessionRegistry::new(10, Duration::from_secs(3600));
        let session = registry.create(SessionId::generate(), "echo", handle("h6")).await.unwrap();
        assert!(registry.destroy(&session.id).await.is_some());
        assert!(registry.destroy(&session.id).await.is_none());
    }

    #[tokio::test]
    async fn stats_reflect_initialized_and_attached_counts() {
        let registry = SessionRegistry::new(10, Duration::from_secs(3600));
        let session = registry.create(SessionId::generate(), "echo", handle("h7")).await.unwrap();
        session.mark_initialized().await;
        let (_id, _rx) = session.attach().await;

        let stats = registry.stats().await;
        assert_eq!(stats.total, 1);
        assert_eq!(stats.initialized, 1);
        assert_eq!(stats.attached_sse, 1);
    }
}
