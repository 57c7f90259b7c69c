use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::SupervisorError;

/// Unique identifier for a supervised process, stable for its whole (possibly
/// restarted) lifetime. The Proxy Core names these `session-<session id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandleId(pub String);

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Stopped,
    Running,
    Crashed,
}

impl ProcessState {
    fn to_u8(self) -> u8 {
        match self {
            ProcessState::Stopped => 0,
            ProcessState::Running => 1,
            ProcessState::Crashed => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => ProcessState::Running,
            2 => ProcessState::Crashed,
            _ => ProcessState::Stopped,
        }
    }
}

/// Shared state cell updated by the I/O task and read by callers of the supervisor.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(initial: ProcessState) -> Self {
        Self(AtomicU8::new(initial.to_u8()))
    }

    pub(crate) fn set(&self, state: ProcessState) {
        self.0.store(state.to_u8(), Ordering::SeqCst);
    }

    pub fn get(&self) -> ProcessState {
        ProcessState::from_u8(self.0.load(Ordering::SeqCst))
    }
}

/// A caller-facing reference to a running (or crashed/stopped) subprocess.
#[derive(Clone)]
pub struct ProcessHandle {
    pub id: HandleId,
    pub(crate) stdin_tx: mpsc::Sender<String>,
    pub(crate) cancel: CancellationToken,
    pub(crate) state: Arc<StateCell>,
}

impl ProcessHandle {
    pub fn state(&self) -> ProcessState {
        self.state.get()
    }

    /// Write one JSON-encoded message to the subprocess's stdin, appending a
    /// trailing newline if the caller didn't include one.
    pub async fn write_line(&self, mut message: String) -> Result<(), SupervisorError> {
        if self.state() != ProcessState::Running {
            return Err(SupervisorError::NotRunning(self.id.0.clone()));
        }
        if !message.ends_with('\n') {
            message.push('\n');
        }
        self.stdin_tx
            .send(message)
            .await
            .map_err(|_| SupervisorError::NotRunning(self.id.0.clone()))
    }

    /// Request termination (SIGTERM-equivalent). No-op if already stopped.
    pub fn kill(&self) {
        self.cancel.cancel();
    }
}
