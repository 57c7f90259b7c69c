use std::path::PathBuf;

use clap::Parser;

/// Command-line flags, the second of the three configuration layers.
///
/// Every field is optional so the CLI layer only overrides what the
/// operator actually passed, leaving the TOML file (or built-in default)
/// in place otherwise.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Bridges STDIO MCP servers over Streamable HTTP", long_about = None)]
pub struct CliArgs {
    /// Path to a TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub session_timeout_ms: Option<u64>,

    #[arg(long)]
    pub batch_timeout_ms: Option<u64>,

    #[arg(long)]
    pub correlation_timeout_ms: Option<u64>,

    #[arg(long)]
    pub max_sessions: Option<usize>,

    #[arg(long)]
    pub max_restart_attempts: Option<u32>,

    #[arg(long)]
    pub restart_delay_ms: Option<u64>,

    /// Repeatable; replaces the TOML file's CORS allow-list if present.
    #[arg(long = "cors-allow-origin")]
    pub cors_allow_origins: Vec<String>,

    /// Repeatable; replaces the TOML file's bearer allow-list if present.
    #[arg(long = "auth-token")]
    pub auth_tokens: Vec<String>,

    /// Quick single-server startup without a config file: name=command.
    #[arg(long = "server", value_parser = parse_inline_server)]
    pub servers: Vec<InlineServer>,
}

#[derive(Debug, Clone)]
pub struct InlineServer {
    pub name: String,
    pub command: String,
}

fn parse_inline_server(raw: &str) -> Result<InlineServer, String> {
    let (name, command) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=COMMAND, got {raw:?}"))?;
    if name.is_empty() || command.is_empty() {
        return Err(format!("expected NAME=COMMAND, got {raw:?}"));
    }
    Ok(InlineServer {
        name: name.to_string(),
        command: command.to_string(),
    })
}
