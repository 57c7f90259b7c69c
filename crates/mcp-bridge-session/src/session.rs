use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use mcp_bridge_protocol::RequestId;
use mcp_bridge_supervisor::HandleId;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tracing::debug;

/// Opaque, URL-safe session identifier, unique for the bridge's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generates a random, URL-safe session id. Exposed (not crate-private)
    /// so the Proxy Core can mint an id before the subprocess it will be
    /// bound to has been spawned — see [`crate::SessionRegistry::create`].
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct SseSink {
    id: u64,
    tx: mpsc::UnboundedSender<Value>,
}

struct MutableState {
    last_activity: Instant,
    initialized: bool,
    queue: VecDeque<Value>,
    sinks: Vec<SseSink>,
    next_sink_id: u64,
}

/// A client↔subprocess binding: the unit the HTTP front-end and Proxy Core
/// operate on. Exclusively owns its subprocess handle id, its outbound
/// message queue, and the waiters for requests it has forwarded.
pub struct Session {
    pub id: SessionId,
    pub server_name: String,
    pub handle_id: HandleId,
    pub created_at: DateTime<Utc>,
    state: Mutex<MutableState>,
    waiters: RwLock<HashMap<RequestId, oneshot::Sender<Value>>>,
}

impl Session {
    pub(crate) fn new(id: SessionId, server_name: String, handle_id: HandleId) -> Self {
        Self {
            id,
            server_name,
            handle_id,
            created_at: Utc::now(),
            state: Mutex::new(MutableState {
                last_activity: Instant::now(),
                initialized: false,
                queue: VecDeque::new(),
                sinks: Vec::new(),
                next_sink_id: 0,
            }),
            waiters: RwLock::new(HashMap::new()),
        }
    }

    pub async fn touch(&self) {
        self.state.lock().await.last_activity = Instant::now();
    }

    pub async fn is_expired(&self, timeout: Duration) -> bool {
        self.state.lock().await.last_activity.elapsed() > timeout
    }

    pub async fn idle_for(&self) -> Duration {
        self.state.lock().await.last_activity.elapsed()
    }

    pub async fn mark_initialized(&self) {
        self.state.lock().await.initialized = true;
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.initialized
    }

    /// Registers a waiter for `id`, to be completed by [`Session::complete_waiter`]
    /// once a matching response arrives from the bound subprocess.
    pub async fn register_waiter(&self, id: RequestId) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        self.waiters.write().await.insert(id, tx);
        rx
    }

    /// Completes the waiter for `id` if one is outstanding. Returns `false`
    /// if no such waiter exists (the message should be queued/streamed instead).
    pub async fn complete_waiter(&self, id: &RequestId, value: Value) -> bool {
        if let Some(tx) = self.waiters.write().await.remove(id) {
            let _ = tx.send(value);
            true
        } else {
            false
        }
    }

    /// Removes a waiter without completing it, e.g. after a correlation
    /// timeout so a response that arrives later is delivered via the
    /// queue/SSE path instead of silently dropped into a closed channel.
    pub async fn remove_waiter(&self, id: &RequestId) {
        self.waiters.write().await.remove(id);
    }

    /// Drops every outstanding waiter, causing their receivers to observe a
    /// closed channel. Used when the bound subprocess crashes mid-flight.
    pub async fn fail_all_waiters(&self) {
        self.waiters.write().await.clear();
    }

    /// Delivers a server-initiated message: broadcast to every attached SSE
    /// stream if any is attached, otherwise append to the FIFO queue.
    pub async fn dispatch(&self, message: Value) {
        let mut state = self.state.lock().await;
        if state.sinks.is_empty() {
            state.queue.push_back(message);
            return;
        }
        state.sinks.retain(|sink| sink.tx.send(message.clone()).is_ok());
    }

    /// Attaches a new SSE sink, draining the current queue into it first.
    /// Draining and registration happen under the same lock so no enqueue
    /// racing the attach is lost or duplicated.
    pub async fn attach(&self) -> (u64, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().await;
        for queued in state.queue.drain(..) {
            let _ = tx.send(queued);
        }
        let id = state.next_sink_id;
        state.next_sink_id += 1;
        state.sinks.push(SseSink { id, tx });
        (id, rx)
    }

    /// Detaches a previously attached sink. Idempotent.
    pub async fn detach(&self, sink_id: u64) {
        let mut state = self.state.lock().await;
        state.sinks.retain(|sink| sink.id != sink_id);
    }

    pub async fn queue_len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    pub async fn attached_count(&self) -> usize {
        self.state.lock().await.sinks.len()
    }

    /// Closes every attached stream and clears the queue, called during
    /// session destruction.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if !state.sinks.is_empty() {
            debug!(session = %self.id, count = state.sinks.len(), "closing attached SSE streams");
        }
        state.sinks.clear();
        state.queue.clear();
        drop(state);
        self.fail_all_waiters().await;
    }
}

pub(crate) type SharedSession = Arc<Session>;
