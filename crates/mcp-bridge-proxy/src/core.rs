use std::sync::Arc;

use mcp_bridge_protocol::{codec::ParsedBody, Envelope, RequestId};
use mcp_bridge_session::{Session, SessionId, SessionRegistry};
use mcp_bridge_supervisor::{HandleId, ProcessSupervisor};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{ProxyConfig, ServerDirectory};
use crate::dispatch;
use crate::error::ProxyError;

/// Routes client messages to their bound subprocess and back, owning the
/// subprocess supervisor and the session registry together so a caller never
/// has to keep the two in sync by hand.
pub struct ProxyCore {
    supervisor: Arc<ProcessSupervisor>,
    registry: Arc<SessionRegistry>,
    servers: ServerDirectory,
    config: ProxyConfig,
}

impl ProxyCore {
    /// Builds the core, starts the registry's expiry sweeper, and starts the
    /// background task that drains subprocess events into their owning
    /// sessions. Both background tasks run for the life of the returned
    /// `Arc` and are not explicitly joined; [`ProxyCore::shutdown`] tears
    /// down the subprocesses they depend on.
    pub fn new(servers: ServerDirectory, config: ProxyConfig) -> Arc<Self> {
        let (supervisor, events) = ProcessSupervisor::new();
        let supervisor = Arc::new(supervisor);
        let registry = Arc::new(SessionRegistry::new(config.max_sessions, config.session_timeout));
        registry.spawn_sweeper();

        let core = Arc::new(Self {
            supervisor: supervisor.clone(),
            registry: registry.clone(),
            servers,
            config,
        });

        tokio::spawn(dispatch::run(events, registry, supervisor));
        core
    }

    /// Handles one decoded request body. `session_id` is the id carried by
    /// the `Mcp-Session-Id` header, if any. `server_name` is the logical
    /// server the POSTed endpoint resolved to, used to bind a fresh session
    /// on `initialize` — ignored for requests that carry a session id.
    /// Returns the response value to write back (an empty batch produces no
    /// value for a request that doesn't need one) and the session the
    /// message was routed to, so the HTTP front-end can set the session
    /// header on `initialize`.
    pub async fn handle_request(
        &self,
        session_id: Option<SessionId>,
        server_name: &str,
        envelope: Envelope,
    ) -> Result<(Option<Value>, Arc<Session>), ProxyError> {
        let session = self.resolve_session(session_id, server_name, &envelope).await?;
        let value = self.forward(&session, &envelope).await?;
        Ok((value, session))
    }

    /// Handles a parsed body that may be a single envelope or a batch.
    /// Batch elements are forwarded in order; an `initialize` earlier in the
    /// batch binds the session used by later elements that don't carry one
    /// of their own. Per-element failures become JSON-RPC error values
    /// rather than aborting the whole batch. The entire batch is bounded by
    /// the configured batch timeout, returning whatever responses completed
    /// by then.
    pub async fn handle_batch(
        &self,
        session_id: Option<SessionId>,
        server_name: &str,
        body: ParsedBody,
    ) -> Result<(Vec<Value>, Option<Arc<Session>>), ProxyError> {
        match body {
            ParsedBody::Single(envelope) => {
                let (value, session) = self.handle_request(session_id, server_name, envelope).await?;
                Ok((value.into_iter().collect(), Some(session)))
            }
            ParsedBody::Batch(envelopes) => {
                let outcome = tokio::time::timeout(
                    self.config.batch_timeout,
                    self.run_batch(session_id, server_name, envelopes),
                )
                .await;
                match outcome {
                    Ok(result) => result,
                    Err(_) => Err(ProxyError::UpstreamTimeout),
                }
            }
        }
    }

    async fn run_batch(
        &self,
        mut session_id: Option<SessionId>,
        server_name: &str,
        envelopes: Vec<Envelope>,
    ) -> Result<(Vec<Value>, Option<Arc<Session>>), ProxyError> {
        let mut responses = Vec::new();
        let mut bound_session = None;

        for envelope in envelopes {
            let session = match self.resolve_session(session_id.clone(), server_name, &envelope).await {
                Ok(session) => session,
                Err(err) => {
                    if envelope.needs_response() {
                        responses.push(error_value(&err, envelope.id().cloned()));
                    }
                    continue;
                }
            };
            session_id = Some(session.id.clone());
            bound_session = Some(session.clone());

            match self.forward(&session, &envelope).await {
                Ok(Some(value)) => responses.push(value),
                Ok(None) => {}
                Err(err) => {
                    if envelope.needs_response() {
                        responses.push(error_value(&err, envelope.id().cloned()));
                    }
                }
            }
        }

        Ok((responses, bound_session))
    }

    async fn resolve_session(
        &self,
        session_id: Option<SessionId>,
        server_name: &str,
        envelope: &Envelope,
    ) -> Result<Arc<Session>, ProxyError> {
        if envelope.is_initialize() {
            if session_id.is_some() {
                return Err(ProxyError::UnexpectedSessionId);
            }
            return self.spawn_session(server_name).await;
        }

        let session_id = session_id.ok_or(ProxyError::SessionRequired)?;
        self.registry
            .get(&session_id)
            .await
            .ok_or(ProxyError::SessionNotFound)
    }

    /// Resolves `server_name` against the configured directory, spawns a
    /// session bound to a freshly spawned subprocess, and destroys the
    /// session again if the spawn fails so no orphaned registry entry is
    /// left behind.
    pub async fn spawn_session(&self, server_name: &str) -> Result<Arc<Session>, ProxyError> {
        let cfg = self
            .servers
            .get(server_name)
            .cloned()
            .ok_or_else(|| ProxyError::EndpointUnknown(server_name.to_string()))?;

        let id = SessionId::generate();
        let handle_id = HandleId(format!("session-{id}"));

        let session = self
            .registry
            .create(id.clone(), server_name, handle_id.clone())
            .await
            .map_err(|_| ProxyError::ResourceExhausted)?;

        if let Err(err) = self
            .supervisor
            .spawn(handle_id, cfg, self.config.restart_policy.clone())
            .await
        {
            self.registry.destroy(&id).await;
            return Err(ProxyError::SpawnFailed(err.to_string()));
        }

        info!(session = %id, server = server_name, "session bound to a freshly spawned subprocess");
        Ok(session)
    }

    async fn forward(&self, session: &Session, envelope: &Envelope) -> Result<Option<Value>, ProxyError> {
        session.touch().await;
        let line = serde_json::to_string(&envelope.to_value())
            .map_err(|err| ProxyError::Internal(err.to_string()))?;

        let waiter = if envelope.needs_response() {
            envelope.id().cloned().map(|id| (id, session))
        } else {
            None
        };
        let pending = match &waiter {
            Some((id, session)) => Some(session.register_waiter(id.clone()).await),
            None => None,
        };

        if let Err(err) = self.supervisor.write_stdin(&session.handle_id, line).await {
            if let Some((id, session)) = &waiter {
                session.remove_waiter(id).await;
            }
            warn!(session = %session.id, error = %err, "failed to write to subprocess stdin");
            return Err(ProxyError::SubprocessCrashed);
        }

        let Some(rx) = pending else {
            return Ok(None);
        };
        let (id, session) = waiter.expect("pending waiter implies a registered id");

        match tokio::time::timeout(self.config.correlation_timeout, rx).await {
            Ok(Ok(value)) => {
                if envelope.is_initialize() {
                    session.mark_initialized().await;
                }
                Ok(Some(value))
            }
            Ok(Err(_)) => Err(ProxyError::SubprocessCrashed),
            Err(_) => {
                session.remove_waiter(&id).await;
                Err(ProxyError::UpstreamTimeout)
            }
        }
    }

    /// Tears down a session and the subprocess bound to it.
    pub async fn destroy_session(&self, id: &SessionId) {
        if let Some(session) = self.registry.destroy(id).await {
            self.supervisor.kill(&session.handle_id).await;
            self.supervisor.remove(&session.handle_id).await;
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn servers(&self) -> &ServerDirectory {
        &self.servers
    }

    /// Destroys every live session and its bound subprocess, for graceful
    /// shutdown.
    pub async fn shutdown(&self) {
        for id in self.registry.all_ids().await {
            self.destroy_session(&id).await;
        }
    }
}

fn error_value(err: &ProxyError, id: Option<RequestId>) -> Value {
    serde_json::to_value(err.to_json_rpc_error(id)).expect("JsonRpcError always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_bridge_supervisor::ServerConfig;
    use serde_json::json;
    use std::time::Duration;

    fn cat_server(name: &str) -> ServerConfig {
        ServerConfig::new(name, "/bin/cat")
    }

    /// A fixture subprocess that answers every numeric-id request with a
    /// genuine JSON-RPC *response* (`result` present), unlike `/bin/cat`
    /// which only ever echoes the request envelope back verbatim — useless
    /// for exercising correlation, since a request is never classified as
    /// a response.
    fn responding_server(name: &str) -> ServerConfig {
        let mut cfg = ServerConfig::new(name, "/bin/sh");
        cfg.args = vec![
            "-c".to_string(),
            "while IFS= read -r line; do \
                id=$(printf '%s' \"$line\" | sed -n 's/.*\"id\" *: *\\([0-9][0-9]*\\).*/\\1/p'); \
                if [ -n \"$id\" ]; then \
                    printf '{\"jsonrpc\":\"2.0\",\"id\":%s,\"result\":{\"ok\":true}}\\n' \"$id\"; \
                fi; \
            done"
            .to_string(),
        ];
        cfg
    }

    fn config_with_short_timeout() -> ProxyConfig {
        ProxyConfig {
            correlation_timeout: Duration::from_millis(200),
            batch_timeout: Duration::from_secs(2),
            ..ProxyConfig::default()
        }
    }

    #[tokio::test]
    async fn initialize_with_an_existing_session_id_is_rejected() {
        let core = ProxyCore::new(
            ServerDirectory::new(vec![cat_server("echo")]),
            config_with_short_timeout(),
        );
        let envelope = Envelope::from_value(json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}
        }))
        .unwrap();

        let err = core
            .handle_request(Some(SessionId::generate()), "echo", envelope)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::UnexpectedSessionId));
    }

    #[tokio::test]
    async fn request_without_a_session_id_requires_one() {
        let core = ProxyCore::new(
            ServerDirectory::new(vec![cat_server("echo")]),
            config_with_short_timeout(),
        );
        let envelope = Envelope::from_value(json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/list"
        }))
        .unwrap();

        let err = core.handle_request(None, "echo", envelope).await.unwrap_err();
        assert!(matches!(err, ProxyError::SessionRequired));
    }

    #[tokio::test]
    async fn unknown_session_id_is_rejected() {
        let core = ProxyCore::new(
            ServerDirectory::new(vec![cat_server("echo")]),
            config_with_short_timeout(),
        );
        let envelope = Envelope::from_value(json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/list"
        }))
        .unwrap();

        let err = core
            .handle_request(Some(SessionId::generate()), "echo", envelope)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::SessionNotFound));
    }

    #[tokio::test]
    async fn initialize_spawns_a_session_and_echoes_the_response() {
        let core = ProxyCore::new(
            ServerDirectory::new(vec![responding_server("echo")]),
            config_with_short_timeout(),
        );
        let envelope = Envelope::from_value(json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}
        }))
        .unwrap();

        let (value, session) = core.handle_request(None, "echo", envelope).await.unwrap();
        let value = value.expect("initialize expects a response");
        assert_eq!(value["id"], json!(1));
        assert!(session.is_initialized().await);
    }

    #[tokio::test]
    async fn notification_produces_no_response_value() {
        let core = ProxyCore::new(
            ServerDirectory::new(vec![responding_server("echo")]),
            config_with_short_timeout(),
        );
        let init = Envelope::from_value(json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}
        }))
        .unwrap();
        let (_value, session) = core.handle_request(None, "echo", init).await.unwrap();

        let notification = Envelope::from_value(json!({
            "jsonrpc": "2.0", "method": "notifications/initialized"
        }))
        .unwrap();
        let (value, _) = core
            .handle_request(Some(session.id.clone()), "echo", notification)
            .await
            .unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn spawn_failure_leaves_no_orphaned_session() {
        let core = ProxyCore::new(
            ServerDirectory::new(vec![ServerConfig::new("broken", "/no/such/binary")]),
            config_with_short_timeout(),
        );
        let err = core.spawn_session("broken").await.unwrap_err();
        assert!(matches!(err, ProxyError::SpawnFailed(_)));
        assert_eq!(core.registry().len().await, 0);
    }

    #[tokio::test]
    async fn batch_binds_later_elements_to_the_session_initialize_created() {
        let core = ProxyCore::new(
            ServerDirectory::new(vec![responding_server("echo")]),
            config_with_short_timeout(),
        );
        let body = ParsedBody::Batch(vec![
            Envelope::from_value(json!({
                "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}
            }))
            .unwrap(),
            Envelope::from_value(json!({
                "jsonrpc": "2.0", "method": "notifications/initialized"
            }))
            .unwrap(),
        ]);

        let (responses, session) = core.handle_batch(None, "echo", body).await.unwrap();
        assert_eq!(responses.len(), 1);
        let session = session.expect("batch with initialize binds a session");
        assert!(session.is_initialized().await);
    }

    #[tokio::test]
    async fn initialize_binds_the_server_the_endpoint_resolved_to() {
        let core = ProxyCore::new(
            ServerDirectory::new(vec![cat_server("a"), cat_server("b")]),
            config_with_short_timeout(),
        );
        let envelope = Envelope::from_value(json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}
        }))
        .unwrap();

        let (_, session) = core.handle_request(None, "b", envelope).await.unwrap();
        assert_eq!(session.server_name, "b");
    }
}
