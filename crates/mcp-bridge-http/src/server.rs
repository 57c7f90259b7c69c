use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use mcp_bridge_config::BridgeConfig;
use mcp_bridge_proxy::ProxyCore;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::handler::{self, AppState};

/// Owns the listener loop: one `hyper` connection per accepted socket, each
/// driven by [`handler::route`] against a shared [`AppState`].
pub struct BridgeServer {
    state: AppState,
}

impl BridgeServer {
    pub fn new(core: Arc<ProxyCore>, config: Arc<BridgeConfig>) -> Self {
        Self {
            state: AppState { core, config },
        }
    }

    /// Binds the configured address and serves connections until the
    /// listener errors. Each connection is handled on its own task so one
    /// slow client can't stall the others.
    pub async fn run(&self) -> std::io::Result<()> {
        let addr = self.state.config.bind_address();
        let listener = TcpListener::bind(&addr).await?;
        info!(%addr, "bridge listening");

        loop {
            let (stream, peer) = listener.accept().await?;
            debug!(%peer, "accepted connection");
            let state = self.state.clone();

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let state = state.clone();
                    async move { Ok::<_, hyper::Error>(handler::route(state, req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    let message = err.to_string();
                    if message.contains("connection closed before message completed") {
                        debug!(%peer, "client disconnected");
                    } else {
                        error!(%peer, error = %message, "connection error");
                    }
                }
            });
        }
    }

    /// Destroys every live session and the subprocesses bound to them, for
    /// use on shutdown signal.
    pub async fn shutdown(&self) {
        self.state.core.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_bridge_config::BridgeConfig;
    use mcp_bridge_proxy::{ProxyConfig, ServerDirectory};
    use mcp_bridge_supervisor::ServerConfig;

    #[tokio::test]
    async fn shutdown_tears_down_every_live_session() {
        let core = ProxyCore::new(
            ServerDirectory::new(vec![ServerConfig::new("echo", "/bin/cat")]),
            ProxyConfig::default(),
        );
        core.spawn_session("echo").await.unwrap();
        assert_eq!(core.registry().len().await, 1);

        let server = BridgeServer::new(core.clone(), Arc::new(BridgeConfig::default()));
        server.shutdown().await;

        assert_eq!(core.registry().len().await, 0);
    }
}
