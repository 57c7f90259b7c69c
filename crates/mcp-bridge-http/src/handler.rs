use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use mcp_bridge_config::BridgeConfig;
use mcp_bridge_protocol::{codec::ParsedBody, JsonRpcError};
use mcp_bridge_proxy::ProxyCore;
use mcp_bridge_session::SessionId;
use tracing::warn;

use crate::router::{self, Route};
use crate::sse;

pub const SESSION_HEADER: &str = "Mcp-Session-Id";

type BridgeBody = BoxBody<Bytes, hyper::Error>;

/// Everything the HTTP front-end needs per request: the proxy core, the
/// static config (CORS/auth policy, listener settings), shared across
/// connections.
#[derive(Clone)]
pub struct AppState {
    pub core: Arc<ProxyCore>,
    pub config: Arc<BridgeConfig>,
}

pub async fn route(state: AppState, req: Request<hyper::body::Incoming>) -> Response<BridgeBody> {
    let origin = req
        .headers()
        .get(http::header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if req.method() == Method::OPTIONS {
        return preflight_response(&state, origin.as_deref());
    }

    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let path = req.uri().path().to_string();
    match crate::auth::check(state.config.auth.as_ref(), auth_header.as_deref(), &path) {
        crate::auth::AuthOutcome::Missing => {
            return with_cors(&state, origin.as_deref(), text_response(StatusCode::UNAUTHORIZED, "missing bearer token"));
        }
        crate::auth::AuthOutcome::Forbidden => {
            return with_cors(&state, origin.as_deref(), text_response(StatusCode::FORBIDDEN, "token not allowed"));
        }
        crate::auth::AuthOutcome::Allowed => {}
    }

    let Some(route) = router::resolve(&path, state.core.servers()) else {
        return with_cors(&state, origin.as_deref(), text_response(StatusCode::NOT_FOUND, "not found"));
    };

    let response = match (route, req.method().clone()) {
        (Route::Health, Method::GET) => text_response(StatusCode::OK, "ok"),
        (Route::Stats, Method::GET) => stats_response(&state).await,
        (Route::Mcp { server_name }, Method::POST) => handle_post(&state, &server_name, req).await,
        (Route::Mcp { .. }, Method::GET) => handle_get(&state, &req).await,
        (Route::Mcp { .. }, Method::DELETE) => handle_delete(&state, &req).await,
        (_, _) => method_not_allowed(),
    };

    with_cors(&state, origin.as_deref(), response)
}

fn preflight_response(state: &AppState, origin: Option<&str>) -> Response<BridgeBody> {
    let mut response = Response::builder().status(StatusCode::NO_CONTENT).body(empty_body()).unwrap();
    if crate::cors::is_allowed(&state.config.cors, origin) {
        crate::cors::apply_headers(response.headers_mut(), &state.config.cors, origin);
    }
    response
}

fn with_cors(state: &AppState, origin: Option<&str>, mut response: Response<BridgeBody>) -> Response<BridgeBody> {
    crate::cors::apply_headers(response.headers_mut(), &state.config.cors, origin);
    response
}

async fn stats_response(state: &AppState) -> Response<BridgeBody> {
    let stats = state.core.registry().stats().await;
    match serde_json::to_vec(&stats) {
        Ok(bytes) => json_response(StatusCode::OK, bytes),
        Err(err) => text_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

async fn handle_post(
    state: &AppState,
    server_name: &str,
    req: Request<hyper::body::Incoming>,
) -> Response<BridgeBody> {
    let headers = req.headers().clone();
    if !content_type_is_json(&headers) {
        return text_response(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Content-Type must be application/json");
    }
    let accept_ok = accept_header(&headers).map(accept_allows_post).unwrap_or(true);
    if !accept_ok {
        return text_response(StatusCode::NOT_ACCEPTABLE, "Accept must include application/json, text/event-stream or */*");
    }

    let session_id = session_id_header(&headers);
    let wants_sse = accept_header(&headers).map(accept_prefers_sse).unwrap_or(false);

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => return text_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    let parsed = match mcp_bridge_protocol::parse_body(&body) {
        Ok(parsed) => parsed,
        Err(err) => {
            let rpc_error = JsonRpcError::new(None, err.as_error_code(), None);
            return json_response(StatusCode::BAD_REQUEST, serde_json::to_vec(&rpc_error).unwrap());
        }
    };

    let is_batch = matches!(parsed, ParsedBody::Batch(_));
    let single_id = match &parsed {
        ParsedBody::Single(envelope) => envelope.id().cloned(),
        ParsedBody::Batch(_) => None,
    };

    match state.core.handle_batch(session_id, server_name, parsed).await {
        Ok((values, session)) => {
            let session_header = session.map(|s| s.id.clone());
            if values.is_empty() {
                return accepted_response(session_header);
            }
            if !is_batch && wants_sse {
                return sse_single_response(values.into_iter().next().unwrap(), session_header);
            }
            let body = if is_batch {
                serde_json::to_vec(&values)
            } else {
                serde_json::to_vec(&values[0])
            };
            match body {
                Ok(bytes) => with_session_header(json_response(StatusCode::OK, bytes), session_header),
                Err(err) => text_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
            }
        }
        Err(err) => {
            let rpc_error = err.to_json_rpc_error(single_id);
            json_response(StatusCode::OK, serde_json::to_vec(&rpc_error).unwrap())
        }
    }
}

async fn handle_get(state: &AppState, req: &Request<hyper::body::Incoming>) -> Response<BridgeBody> {
    let headers = req.headers();
    if !headers
        .get(http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|a| a.contains("text/event-stream"))
        .unwrap_or(false)
    {
        return text_response(StatusCode::NOT_ACCEPTABLE, "Accept must include text/event-stream");
    }

    let Some(session_id) = session_id_header(headers) else {
        return text_response(StatusCode::BAD_REQUEST, "Mcp-Session-Id header required");
    };
    let Some(session) = state.core.registry().get(&session_id).await else {
        return text_response(StatusCode::NOT_FOUND, "unknown session");
    };

    let session_id = session.id.to_string();
    Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "text/event-stream")
        .header(http::header::CACHE_CONTROL, "no-cache, no-transform")
        .header(http::header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no")
        .header(SESSION_HEADER, session_id)
        .body(sse::attach_body(session))
        .unwrap()
}

async fn handle_delete(state: &AppState, req: &Request<hyper::body::Incoming>) -> Response<BridgeBody> {
    let Some(session_id) = session_id_header(req.headers()) else {
        return text_response(StatusCode::BAD_REQUEST, "Mcp-Session-Id header required");
    };
    state.core.destroy_session(&session_id).await;
    Response::builder().status(StatusCode::NO_CONTENT).body(empty_body()).unwrap()
}

fn method_not_allowed() -> Response<BridgeBody> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(http::header::ALLOW, "POST, GET, DELETE")
        .body(empty_body())
        .unwrap()
}

fn content_type_is_json(headers: &HeaderMap) -> bool {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false)
}

fn accept_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(http::header::ACCEPT).and_then(|v| v.to_str().ok())
}

fn accept_allows_post(accept: &str) -> bool {
    accept.contains("application/json") || accept.contains("text/event-stream") || accept.contains("*/*")
}

fn accept_prefers_sse(accept: &str) -> bool {
    accept.contains("text/event-stream")
}

fn session_id_header(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| SessionId(s.to_string()))
}

fn accepted_response(session_id: Option<SessionId>) -> Response<BridgeBody> {
    let mut response = Response::builder().status(StatusCode::ACCEPTED).body(empty_body()).unwrap();
    if let Some(id) = session_id {
        if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    response
}

fn with_session_header(mut response: Response<BridgeBody>, session_id: Option<SessionId>) -> Response<BridgeBody> {
    if let Some(id) = session_id {
        if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    response
}

fn sse_single_response(value: serde_json::Value, session_id: Option<SessionId>) -> Response<BridgeBody> {
    let frame = mcp_bridge_protocol::sse::SseFrame::new(0, value);
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "text/event-stream")
        .header(http::header::CACHE_CONTROL, "no-cache, no-transform")
        .body(text_body(frame.format()))
        .unwrap();
    if let Some(id) = session_id {
        if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    response
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response<BridgeBody> {
    Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(text_body_bytes(Bytes::from(body)))
        .unwrap()
}

fn text_response(status: StatusCode, message: &str) -> Response<BridgeBody> {
    if status.is_client_error() || status.is_server_error() {
        warn!(status = status.as_u16(), %message, "request rejected");
    }
    Response::builder().status(status).body(text_body(message.to_string())).unwrap()
}

fn text_body(text: String) -> BridgeBody {
    text_body_bytes(Bytes::from(text))
}

fn text_body_bytes(bytes: Bytes) -> BridgeBody {
    Full::new(bytes).map_err(|never| match never {}).boxed()
}

fn empty_body() -> BridgeBody {
    Full::new(Bytes::new()).map_err(|never| match never {}).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                http::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn content_type_requires_application_json() {
        assert!(content_type_is_json(&headers(&[("content-type", "application/json")])));
        assert!(content_type_is_json(&headers(&[(
            "content-type",
            "application/json; charset=utf-8"
        )])));
        assert!(!content_type_is_json(&headers(&[("content-type", "text/plain")])));
        assert!(!content_type_is_json(&headers(&[])));
    }

    #[test]
    fn accept_header_permits_json_sse_or_wildcard() {
        assert!(accept_allows_post("application/json"));
        assert!(accept_allows_post("text/event-stream"));
        assert!(accept_allows_post("*/*"));
        assert!(!accept_allows_post("text/html"));
    }

    #[test]
    fn sse_is_only_preferred_when_explicitly_accepted() {
        assert!(accept_prefers_sse("text/event-stream"));
        assert!(!accept_prefers_sse("application/json"));
    }

    #[test]
    fn session_header_round_trips_through_the_response() {
        let session_id = SessionId("abc-123".into());
        let response = accepted_response(Some(session_id.clone()));
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers().get(SESSION_HEADER).unwrap(), "abc-123");
    }

    #[test]
    fn accepted_response_without_a_session_carries_no_header() {
        let response = accepted_response(None);
        assert!(response.headers().get(SESSION_HEADER).is_none());
    }

    #[test]
    fn method_not_allowed_advertises_the_supported_verbs() {
        let response = method_not_allowed();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(http::header::ALLOW).unwrap(), "POST, GET, DELETE");
    }

    #[test]
    fn session_id_header_reads_the_configured_header_name() {
        let found = session_id_header(&headers(&[(SESSION_HEADER, "s-1")]));
        assert_eq!(found, Some(SessionId("s-1".into())));
        assert_eq!(session_id_header(&headers(&[])), None);
    }
}
