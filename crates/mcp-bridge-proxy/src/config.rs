use std::collections::HashMap;
use std::time::Duration;

use mcp_bridge_supervisor::{RestartPolicy, ServerConfig};

/// Tunables the Proxy Core needs beyond the per-server configuration:
/// timeouts and resource caps from `BridgeConfig` (the ambient config
/// crate owns parsing; this is just the shape the core consumes).
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub correlation_timeout: Duration,
    pub batch_timeout: Duration,
    pub max_sessions: usize,
    pub session_timeout: Duration,
    pub restart_policy: RestartPolicy,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            correlation_timeout: Duration::from_secs(30),
            batch_timeout: Duration::from_secs(5),
            max_sessions: 100,
            session_timeout: Duration::from_secs(3600),
            restart_policy: RestartPolicy::default(),
        }
    }
}

/// The immutable directory of configured MCP servers, keyed by logical name.
#[derive(Debug, Clone, Default)]
pub struct ServerDirectory(HashMap<String, ServerConfig>);

impl ServerDirectory {
    pub fn new(servers: Vec<ServerConfig>) -> Self {
        Self(servers.into_iter().map(|cfg| (cfg.name.clone(), cfg)).collect())
    }

    pub fn get(&self, name: &str) -> Option<&ServerConfig> {
        self.0.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|s| s.as_str())
    }

    /// `Some(name)` when exactly one server is configured — the `/mcp`
    /// alias path resolves to it.
    pub fn sole_server(&self) -> Option<&str> {
        if self.0.len() == 1 {
            self.0.keys().next().map(|s| s.as_str())
        } else {
            None
        }
    }
}
