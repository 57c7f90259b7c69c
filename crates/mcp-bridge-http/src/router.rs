use mcp_bridge_proxy::ServerDirectory;

/// What a request path resolves to, ahead of method-specific handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Health,
    Stats,
    Mcp { server_name: String },
}

/// Resolves a request path against the configured servers: each server's
/// `endpoint_path()` (or `/<name>` by default), plus `/mcp` as an alias for
/// the lone server when exactly one is configured, and the two fixed
/// non-MCP endpoints.
pub fn resolve(path: &str, servers: &ServerDirectory) -> Option<Route> {
    if path == "/health" {
        return Some(Route::Health);
    }
    if path == "/stats" {
        return Some(Route::Stats);
    }
    if path == "/mcp" {
        if let Some(name) = servers.sole_server() {
            return Some(Route::Mcp { server_name: name.to_string() });
        }
    }
    for name in servers.names() {
        let cfg = servers.get(name)?;
        if cfg.endpoint_path() == path {
            return Some(Route::Mcp { server_name: name.to_string() });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_bridge_supervisor::ServerConfig;

    #[test]
    fn default_endpoint_is_slash_name() {
        let servers = ServerDirectory::new(vec![ServerConfig::new("echo", "/bin/cat")]);
        assert_eq!(resolve("/echo", &servers), Some(Route::Mcp { server_name: "echo".into() }));
    }

    #[test]
    fn mcp_alias_resolves_when_exactly_one_server() {
        let servers = ServerDirectory::new(vec![ServerConfig::new("echo", "/bin/cat")]);
        assert_eq!(resolve("/mcp", &servers), Some(Route::Mcp { server_name: "echo".into() }));
    }

    #[test]
    fn mcp_alias_absent_with_multiple_servers() {
        let servers = ServerDirectory::new(vec![
            ServerConfig::new("a", "/bin/cat"),
            ServerConfig::new("b", "/bin/cat"),
        ]);
        assert_eq!(resolve("/mcp", &servers), None);
    }

    #[test]
    fn unknown_path_resolves_to_none() {
        let servers = ServerDirectory::new(vec![ServerConfig::new("echo", "/bin/cat")]);
        assert_eq!(resolve("/nope", &servers), None);
    }

    #[test]
    fn health_and_stats_are_always_routed() {
        let servers = ServerDirectory::new(vec![]);
        assert_eq!(resolve("/health", &servers), Some(Route::Health));
        assert_eq!(resolve("/stats", &servers), Some(Route::Stats));
    }
}
