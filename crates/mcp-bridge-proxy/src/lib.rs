//! Proxy Core: routes decoded JSON-RPC messages to the subprocess bound to
//! their session and correlates subprocess responses back to the waiting
//! caller.
//!
//! This crate sits between [`mcp_bridge_session`] (identity and queuing) and
//! [`mcp_bridge_supervisor`] (subprocess lifecycle), and is the only thing
//! that needs to know about both.

mod config;
mod core;
mod dispatch;
mod error;

pub use config::{ProxyConfig, ServerDirectory};
pub use core::ProxyCore;
pub use error::ProxyError;
