use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Static description of one MCP subprocess, as loaded from `BridgeConfig`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Logical name, also the default HTTP endpoint suffix (`/<name>`).
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Overlaid onto the parent process's environment, not replacing it.
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Explicit HTTP endpoint path; defaults to `/<name>` when absent.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            endpoint: None,
        }
    }

    pub fn endpoint_path(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("/{}", self.name))
    }
}
