//! Session registry: binds bridge clients to their subprocess handles.
//!
//! Owns session identity and allocation, the activity clock, the
//! server-initiated message queue, and the set of SSE sinks attached to each
//! session. This crate is method-agnostic: it knows [`mcp_bridge_protocol`]'s
//! envelope shape but nothing about MCP method semantics, and it knows
//! [`mcp_bridge_supervisor`]'s [`mcp_bridge_supervisor::HandleId`] but not how
//! processes are spawned.

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::{RegistryStats, SessionRegistry};
pub use session::{Session, SessionId};
