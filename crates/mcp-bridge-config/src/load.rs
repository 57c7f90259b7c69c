use std::env;

use mcp_bridge_supervisor::ServerConfig;

use crate::cli::CliArgs;
use crate::error::ConfigError;
use crate::model::{AuthConfig, BridgeConfig, CorsConfig};

/// Assembles a [`BridgeConfig`] from the file named by `args.config` (if
/// any), then the CLI flags, then `MCP_BRIDGE_*` environment variables,
/// each layer overriding the last, and validates the result.
pub fn load(args: CliArgs) -> Result<BridgeConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => load_file(path)?,
        None => BridgeConfig::default(),
    };

    apply_cli(&mut config, &args);
    apply_env(&mut config)?;
    validate(&config)?;
    Ok(config)
}

fn load_file(path: &std::path::Path) -> Result<BridgeConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.display().to_string(),
        source,
    })
}

fn apply_cli(config: &mut BridgeConfig, args: &CliArgs) {
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(v) = args.session_timeout_ms {
        config.session_timeout_ms = v;
    }
    if let Some(v) = args.batch_timeout_ms {
        config.batch_timeout_ms = v;
    }
    if let Some(v) = args.correlation_timeout_ms {
        config.correlation_timeout_ms = v;
    }
    if let Some(v) = args.max_sessions {
        config.max_sessions = v;
    }
    if let Some(v) = args.max_restart_attempts {
        config.max_restart_attempts = v;
    }
    if let Some(v) = args.restart_delay_ms {
        config.restart_delay_ms = v;
    }
    if !args.cors_allow_origins.is_empty() {
        config.cors = CorsConfig {
            allowed_origins: args.cors_allow_origins.clone(),
        };
    }
    if !args.auth_tokens.is_empty() {
        config.auth = Some(AuthConfig {
            allowed_tokens: args.auth_tokens.clone(),
        });
    }
    for inline in &args.servers {
        config.servers.push(ServerConfig::new(&inline.name, &inline.command));
    }
}

fn apply_env(config: &mut BridgeConfig) -> Result<(), ConfigError> {
    if let Some(v) = env_var("MCP_BRIDGE_HOST") {
        config.host = v;
    }
    if let Some(v) = env_u16("MCP_BRIDGE_PORT")? {
        config.port = v;
    }
    if let Some(v) = env_u64("MCP_BRIDGE_SESSION_TIMEOUT_MS")? {
        config.session_timeout_ms = v;
    }
    if let Some(v) = env_u64("MCP_BRIDGE_BATCH_TIMEOUT_MS")? {
        config.batch_timeout_ms = v;
    }
    if let Some(v) = env_u64("MCP_BRIDGE_CORRELATION_TIMEOUT_MS")? {
        config.correlation_timeout_ms = v;
    }
    if let Some(v) = env_usize("MCP_BRIDGE_MAX_SESSIONS")? {
        config.max_sessions = v;
    }
    if let Some(v) = env_u32("MCP_BRIDGE_MAX_RESTART_ATTEMPTS")? {
        config.max_restart_attempts = v;
    }
    if let Some(v) = env_u64("MCP_BRIDGE_RESTART_DELAY_MS")? {
        config.restart_delay_ms = v;
    }
    if let Some(v) = env_var("MCP_BRIDGE_CORS_ALLOW_ORIGINS") {
        config.cors = CorsConfig {
            allowed_origins: split_csv(&v),
        };
    }
    if let Some(v) = env_var("MCP_BRIDGE_AUTH_TOKENS") {
        config.auth = Some(AuthConfig {
            allowed_tokens: split_csv(&v),
        });
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn split_csv(v: &str) -> Vec<String> {
    v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

macro_rules! env_numeric {
    ($fn_name:ident, $ty:ty) => {
        fn $fn_name(name: &str) -> Result<Option<$ty>, ConfigError> {
            match env_var(name) {
                Some(raw) => raw
                    .parse::<$ty>()
                    .map(Some)
                    .map_err(|err| ConfigError::InvalidValue {
                        field: name_to_static(name),
                        message: err.to_string(),
                    }),
                None => Ok(None),
            }
        }
    };
}

env_numeric!(env_u16, u16);
env_numeric!(env_u32, u32);
env_numeric!(env_u64, u64);
env_numeric!(env_usize, usize);

/// Environment variable names used in this module are all `'static` string
/// literals already; this just threads that lifetime through the macro.
fn name_to_static(name: &str) -> &'static str {
    match name {
        "MCP_BRIDGE_PORT" => "MCP_BRIDGE_PORT",
        "MCP_BRIDGE_SESSION_TIMEOUT_MS" => "MCP_BRIDGE_SESSION_TIMEOUT_MS",
        "MCP_BRIDGE_BATCH_TIMEOUT_MS" => "MCP_BRIDGE_BATCH_TIMEOUT_MS",
        "MCP_BRIDGE_CORRELATION_TIMEOUT_MS" => "MCP_BRIDGE_CORRELATION_TIMEOUT_MS",
        "MCP_BRIDGE_MAX_SESSIONS" => "MCP_BRIDGE_MAX_SESSIONS",
        "MCP_BRIDGE_MAX_RESTART_ATTEMPTS" => "MCP_BRIDGE_MAX_RESTART_ATTEMPTS",
        "MCP_BRIDGE_RESTART_DELAY_MS" => "MCP_BRIDGE_RESTART_DELAY_MS",
        _ => "MCP_BRIDGE_*",
    }
}

fn validate(config: &BridgeConfig) -> Result<(), ConfigError> {
    if config.servers.is_empty() {
        return Err(ConfigError::NoServers);
    }
    if config.host.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "host",
            message: "must not be empty".to_string(),
        });
    }
    if config.port == 0 {
        return Err(ConfigError::InvalidValue {
            field: "port",
            message: "must not be 0".to_string(),
        });
    }
    if config.max_sessions == 0 {
        return Err(ConfigError::InvalidValue {
            field: "max_sessions",
            message: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["bridge"];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn defaults_fail_validation_without_any_servers() {
        let err = load(args(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::NoServers));
    }

    #[test]
    fn inline_server_flag_satisfies_validation() {
        let config = load(args(&["--server", "echo=/bin/cat"])).unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].name, "echo");
        assert_eq!(config.servers[0].command, "/bin/cat");
    }

    #[test]
    fn cli_flags_override_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            port = 9000
            [[servers]]
            name = "echo"
            command = "/bin/cat"
            "#
        )
        .unwrap();

        let config = load(args(&[
            "--config",
            file.path().to_str().unwrap(),
            "--port",
            "9100",
        ]))
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.servers.len(), 1);
    }

    #[test]
    #[serial_test::serial]
    fn env_vars_override_cli_flags() {
        unsafe {
            env::set_var("MCP_BRIDGE_PORT", "9200");
        }
        let result = load(args(&["--server", "echo=/bin/cat", "--port", "9100"]));
        unsafe {
            env::remove_var("MCP_BRIDGE_PORT");
        }
        let config = result.unwrap();
        assert_eq!(config.port, 9200);
    }

    #[test]
    #[serial_test::serial]
    fn invalid_numeric_env_var_is_reported() {
        unsafe {
            env::set_var("MCP_BRIDGE_PORT", "not-a-number");
        }
        let result = load(args(&["--server", "echo=/bin/cat"]));
        unsafe {
            env::remove_var("MCP_BRIDGE_PORT");
        }
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "MCP_BRIDGE_PORT", .. }));
    }
}
