use std::time::Duration;

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, StreamBody};
use hyper::body::Frame;
use mcp_bridge_protocol::sse::{comment, SseFrame};
use mcp_bridge_session::Session;
use std::sync::Arc;
use tracing::debug;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Builds the body for a GET SSE attach: drains the session's queue first
/// (done by [`Session::attach`] itself), then forwards every subsequently
/// dispatched message, interleaved with a `:ok` comment every 30 seconds of
/// silence. Detaches the sink once the stream is dropped, e.g. on client
/// disconnect.
pub fn attach_body(session: Arc<Session>) -> BoxBody<Bytes, hyper::Error> {
    let stream = async_stream::stream! {
        let (sink_id, mut rx) = session.attach().await;
        yield Ok(Bytes::from(comment("ok")));

        let mut next_id: u64 = 0;
        loop {
            tokio::select! {
                message = rx.recv() => {
                    match message {
                        Some(value) => {
                            let frame = SseFrame::new(next_id, value);
                            next_id += 1;
                            let rendered = frame.format();
                            if rendered.len() > mcp_bridge_protocol::sse::SSE_SOFT_CAP_BYTES {
                                debug!(session = %session.id, bytes = rendered.len(), "SSE frame exceeds soft cap");
                            }
                            yield Ok(Bytes::from(rendered));
                        }
                        None => break,
                    }
                }
                _ = tokio::time::sleep(KEEPALIVE_INTERVAL) => {
                    yield Ok(Bytes::from(comment("ok")));
                }
            }
        }

        session.detach(sink_id).await;
    };

    let body_stream = tokio_stream::StreamExt::map(stream, |item: Result<Bytes, hyper::Error>| {
        item.map(Frame::data)
    });
    StreamBody::new(body_stream).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt as _;
    use mcp_bridge_session::{SessionId, SessionRegistry};
    use mcp_bridge_supervisor::HandleId;
    use serde_json::json;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn queued_message_is_delivered_before_the_body_is_dropped() {
        let registry = SessionRegistry::new(10, StdDuration::from_secs(3600));
        let session = registry
            .create(SessionId::generate(), "echo", HandleId("h1".into()))
            .await
            .unwrap();
        session.dispatch(json!({"hello": "world"})).await;

        let mut body = attach_body(session);
        let mut collected = Vec::new();
        while let Some(frame) = body.frame().await {
            let frame = frame.unwrap();
            if let Some(data) = frame.data_ref() {
                collected.push(String::from_utf8(data.to_vec()).unwrap());
            }
            if collected.len() >= 2 {
                break;
            }
        }
        let joined = collected.concat();
        assert!(joined.contains(":ok"));
        assert!(joined.contains("\"hello\":\"world\""));
    }
}
