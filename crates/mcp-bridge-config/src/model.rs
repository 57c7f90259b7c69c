use mcp_bridge_supervisor::ServerConfig;
use serde::Deserialize;

/// CORS policy applied ahead of routing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// `["*"]` permits any origin. Otherwise an exact allow-list.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Bearer-token auth policy. Absent entirely disables auth.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    pub allowed_tokens: Vec<String>,
}

/// The root configuration object, assembled from an optional TOML file,
/// CLI flags, and `MCP_BRIDGE_*` environment variables in that ascending
/// precedence order.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    pub session_timeout_ms: u64,
    pub batch_timeout_ms: u64,
    pub correlation_timeout_ms: u64,
    pub max_sessions: usize,
    pub max_restart_attempts: u32,
    pub restart_delay_ms: u64,
    pub cors: CorsConfig,
    pub auth: Option<AuthConfig>,
    pub servers: Vec<ServerConfig>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            session_timeout_ms: 3_600_000,
            batch_timeout_ms: 5_000,
            correlation_timeout_ms: 30_000,
            max_sessions: 100,
            max_restart_attempts: 3,
            restart_delay_ms: 1_000,
            cors: CorsConfig::default(),
            auth: None,
            servers: Vec::new(),
        }
    }
}

impl BridgeConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
