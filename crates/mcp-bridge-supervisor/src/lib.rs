//! Spawns, line-frames, and restarts local JSON-RPC subprocesses on behalf
//! of the bridge's Proxy Core.

mod config;
mod error;
mod events;
mod handle;
mod process;
mod supervisor;

pub use config::ServerConfig;
pub use error::SupervisorError;
pub use events::SupervisorEvent;
pub use handle::{HandleId, ProcessHandle, ProcessState};
pub use process::RestartPolicy;
pub use supervisor::ProcessSupervisor;
