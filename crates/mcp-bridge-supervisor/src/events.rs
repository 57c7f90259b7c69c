use crate::handle::HandleId;

/// Observable events emitted by the supervisor, consumed by the Proxy Core.
///
/// Modeled as a single typed channel rather than a broadcast bus: one
/// consumer demultiplexes by [`HandleId`].
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    Started { id: HandleId },
    Stopped { id: HandleId, exit_code: Option<i32> },
    Crashed { id: HandleId, error: String },
    Restarted { id: HandleId, attempt: u32 },
    Stdout { id: HandleId, line: String },
    Stderr { id: HandleId, line: String },
    /// The restart budget was exhausted; the handle is gone for good.
    Exhausted { id: HandleId },
}
