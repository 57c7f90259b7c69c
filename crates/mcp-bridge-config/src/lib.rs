//! Layered startup configuration: an optional TOML file, overridden by CLI
//! flags, overridden in turn by `MCP_BRIDGE_*` environment variables.
//!
//! Validation happens once, in [`load`], before any listener is opened —
//! a bridge with no configured servers or an unusable bind address refuses
//! to start rather than failing requests one at a time.

mod cli;
mod error;
mod load;
mod model;

pub use cli::CliArgs;
pub use error::ConfigError;
pub use load::load;
pub use model::{AuthConfig, BridgeConfig, CorsConfig};
