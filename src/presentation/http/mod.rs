//! HTTP API surface: routes and handlers.

pub mod handlers;
pub mod routes;
