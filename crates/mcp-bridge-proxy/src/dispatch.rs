use std::sync::Arc;

use mcp_bridge_protocol::codec;
use mcp_bridge_session::SessionRegistry;
use mcp_bridge_supervisor::{HandleId, ProcessSupervisor, SupervisorEvent};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Runs for the life of the bridge, consuming supervisor events and routing
/// each to its owning session: completing a correlated waiter, or handing an
/// uncorrelated message to the session's queue/SSE set. This is the
/// "cross-session isolation" boundary from the design notes — the lookup is
/// always by handle id, never by bare request id, so a response can only
/// ever complete a waiter on the one session its subprocess is bound to.
pub async fn run(
    mut events: mpsc::Receiver<SupervisorEvent>,
    registry: Arc<SessionRegistry>,
    supervisor: Arc<ProcessSupervisor>,
) {
    while let Some(event) = events.recv().await {
        match event {
            SupervisorEvent::Stdout { id, line } => handle_stdout(&registry, &id, &line).await,
            SupervisorEvent::Stderr { id, line } => {
                debug!(handle = %id, "subprocess stderr: {line}");
            }
            SupervisorEvent::Crashed { id, error } => {
                warn!(handle = %id, "subprocess crashed: {error}");
                if let Some(session) = registry.get_by_handle(&id).await {
                    session.fail_all_waiters().await;
                }
            }
            SupervisorEvent::Restarted { id, attempt } => {
                debug!(handle = %id, attempt, "subprocess restarted");
            }
            SupervisorEvent::Exhausted { id } => {
                warn!(handle = %id, "restart budget exhausted, destroying owning session");
                if let Some(session) = registry.get_by_handle(&id).await {
                    registry.destroy(&session.id).await;
                }
                supervisor.remove(&id).await;
            }
            SupervisorEvent::Started { .. } | SupervisorEvent::Stopped { .. } => {}
        }
    }
}

async fn handle_stdout(registry: &SessionRegistry, handle_id: &HandleId, line: &str) {
    let Some(session) = registry.get_by_handle(handle_id).await else {
        warn!(handle = %handle_id, "stdout line for a handle with no bound session, dropping");
        return;
    };
    session.touch().await;

    let envelope = match codec::parse_line(line) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(handle = %handle_id, "malformed line from subprocess: {err}");
            return;
        }
    };

    if envelope.is_response() {
        if let Some(id) = envelope.id() {
            if session.complete_waiter(id, envelope.to_value()).await {
                return;
            }
        }
    }

    session.dispatch(envelope.to_value()).await;
}
