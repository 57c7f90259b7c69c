use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use tracing::warn;

use crate::config::ServerConfig;
use crate::error::SupervisorError;
use crate::events::SupervisorEvent;
use crate::handle::{HandleId, ProcessHandle};
use crate::process::{self, RestartPolicy};

/// Owns every supervised subprocess, keyed by [`HandleId`]. One bridge
/// session binds to exactly one handle.
pub struct ProcessSupervisor {
    handles: RwLock<HashMap<HandleId, ProcessHandle>>,
    events_tx: mpsc::Sender<SupervisorEvent>,
}

impl ProcessSupervisor {
    /// Creates a supervisor and its event stream. The channel is sized
    /// generously since stdout/stderr lines flow through it continuously
    /// for every handle.
    pub fn new() -> (Self, mpsc::Receiver<SupervisorEvent>) {
        let (events_tx, events_rx) = mpsc::channel(1024);
        (
            Self {
                handles: RwLock::new(HashMap::new()),
                events_tx,
            },
            events_rx,
        )
    }

    /// Spawns `cfg` under `id` and registers the resulting handle. Rejects
    /// a duplicate id rather than silently replacing the existing handle.
    pub async fn spawn(
        &self,
        id: HandleId,
        cfg: ServerConfig,
        policy: RestartPolicy,
    ) -> Result<(), SupervisorError> {
        {
            let handles = self.handles.read().await;
            if handles.contains_key(&id) {
                return Err(SupervisorError::DuplicateHandle(id.0));
            }
        }

        let handle = process::spawn(id.clone(), cfg, policy, self.events_tx.clone()).await?;
        self.handles.write().await.insert(id, handle);
        Ok(())
    }

    /// Writes a line to the named handle's stdin.
    pub async fn write_stdin(&self, id: &HandleId, message: String) -> Result<(), SupervisorError> {
        let handles = self.handles.read().await;
        let handle = handles
            .get(id)
            .ok_or_else(|| SupervisorError::UnknownHandle(id.0.clone()))?;
        handle.write_line(message).await
    }

    /// Requests termination of the named handle. Unknown ids are a no-op
    /// with a warning, not an error, since the caller may be racing a
    /// crash-triggered removal.
    pub async fn kill(&self, id: &HandleId) {
        let handles = self.handles.read().await;
        match handles.get(id) {
            Some(handle) => handle.kill(),
            None => warn!(handle = %id, "kill requested for unknown handle"),
        }
    }

    /// Requests termination of every supervised handle, e.g. on bridge shutdown.
    pub async fn kill_all(&self) {
        let handles = self.handles.read().await;
        for handle in handles.values() {
            handle.kill();
        }
    }

    /// Removes a handle from the registry, e.g. once its session is destroyed.
    pub async fn remove(&self, id: &HandleId) {
        self.handles.write().await.remove(id);
    }

    pub async fn state_of(&self, id: &HandleId) -> Option<crate::handle::ProcessState> {
        self.handles.read().await.get(id).map(|h| h.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat_config(name: &str) -> ServerConfig {
        ServerConfig::new(name, "/bin/cat")
    }

    #[tokio::test]
    async fn duplicate_handle_id_is_rejected() {
        let (sup, _rx) = ProcessSupervisor::new();
        let id = HandleId("dup".into());
        sup.spawn(id.clone(), cat_config("dup"), RestartPolicy::default())
            .await
            .expect("first spawn succeeds");

        let err = sup
            .spawn(id, cat_config("dup"), RestartPolicy::default())
            .await
            .expect_err("second spawn with same id should fail");
        assert!(matches!(err, SupervisorError::DuplicateHandle(_)));
    }

    #[tokio::test]
    async fn write_stdin_to_unknown_handle_errors() {
        let (sup, _rx) = ProcessSupervisor::new();
        let err = sup
            .write_stdin(&HandleId("ghost".into()), "hi".into())
            .await
            .expect_err("unknown handle should error");
        assert!(matches!(err, SupervisorError::UnknownHandle(_)));
    }

    #[tokio::test]
    async fn kill_of_unknown_handle_is_a_no_op() {
        let (sup, _rx) = ProcessSupervisor::new();
        sup.kill(&HandleId("ghost".into())).await;
    }

    #[tokio::test]
    async fn spawn_then_write_then_kill_round_trips() {
        let (sup, mut rx) = ProcessSupervisor::new();
        let id = HandleId("rt".into());
        sup.spawn(id.clone(), cat_config("rt"), RestartPolicy::default())
            .await
            .expect("spawn succeeds");
        assert!(matches!(rx.recv().await, Some(SupervisorEvent::Started { .. })));

        sup.write_stdin(&id, "ping".into()).await.expect("write succeeds");
        match rx.recv().await {
            Some(SupervisorEvent::Stdout { line, .. }) => assert_eq!(line, "ping"),
            other => panic!("expected Stdout event, got {other:?}"),
        }

        sup.kill(&id).await;
        assert!(matches!(rx.recv().await, Some(SupervisorEvent::Stopped { .. })));
    }
}
