//! Presentation layer: HTTP routes, middleware, and the WebSocket
//! hub and sessions.

pub mod http;
pub mod middleware;
pub mod websocket;
