//! Streamable HTTP front-end: request routing, CORS, bearer auth and the
//! SSE response bodies, sitting directly on top of the Proxy Core.

mod auth;
mod cors;
mod handler;
mod router;
mod server;
mod sse;

pub use handler::{AppState, SESSION_HEADER};
pub use router::Route;
pub use server::BridgeServer;
