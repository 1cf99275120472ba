//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::auth_middleware;
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        // WebSocket endpoint (protected; accepts a query token for
        // clients that cannot set headers)
        .route(
            "/ws",
            get(ws_handler).route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// API v1 routes (all protected)
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/messages", message_routes(state.clone()))
        .nest("/groups", group_routes(state))
}

/// Message history routes (protected)
fn message_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/public", get(handlers::message::get_public_messages))
        .route(
            "/private/{user_id}",
            get(handlers::message::get_private_messages),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Group routes (protected)
fn group_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::group::create_group))
        .route("/{group_id}/members", post(handlers::group::add_member))
        .route(
            "/{group_id}/messages",
            get(handlers::message::get_group_messages),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
