use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mcp_bridge_config::CliArgs;
use mcp_bridge_http::BridgeServer;
use mcp_bridge_proxy::{ProxyConfig, ProxyCore, ServerDirectory};
use mcp_bridge_supervisor::RestartPolicy;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "mcp_bridge=info".to_string()),
        )
        .init();

    let args = CliArgs::parse();
    let config = mcp_bridge_config::load(args)?;

    info!(host = %config.host, port = config.port, servers = config.servers.len(), "starting bridge");

    let servers = ServerDirectory::new(config.servers.clone());
    let proxy_config = ProxyConfig {
        correlation_timeout: Duration::from_millis(config.correlation_timeout_ms),
        batch_timeout: Duration::from_millis(config.batch_timeout_ms),
        max_sessions: config.max_sessions,
        session_timeout: Duration::from_millis(config.session_timeout_ms),
        restart_policy: RestartPolicy {
            max_attempts: config.max_restart_attempts,
            delay: Duration::from_millis(config.restart_delay_ms),
        },
    };

    let core = ProxyCore::new(servers, proxy_config);
    let bridge_config = Arc::new(config);
    let server = BridgeServer::new(core, bridge_config);

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    server.shutdown().await;
    Ok(())
}
