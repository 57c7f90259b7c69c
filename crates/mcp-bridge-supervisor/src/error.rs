/// Errors raised by the process supervisor.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("handle id {0} is already in use")]
    DuplicateHandle(String),

    #[error("failed to spawn subprocess: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("subprocess exited within the startup window (code: {0:?})")]
    ExitedDuringStartup(Option<i32>),

    #[error("handle {0} is not running")]
    NotRunning(String),

    #[error("failed to write to subprocess stdin: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error("unknown handle id: {0}")]
    UnknownHandle(String),
}
