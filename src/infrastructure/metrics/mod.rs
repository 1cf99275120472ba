//! Prometheus Metrics Module
//!
//! Application-wide metrics collection.
//!
//! # Metrics Collected
//! - Active WebSocket connection gauge
//! - Dispatched / dropped-by-backpressure message counters
//! - Relay publish and receive counters
//! - Message page cache hit/miss counters

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Active WebSocket connections gauge
pub static CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("connections_active", "Number of live WebSocket connections")
            .namespace("chat_hub"),
    )
    .expect("Failed to create CONNECTIONS_ACTIVE metric")
});

/// Messages handled by the hub, labelled by outcome
pub static MESSAGES_DISPATCHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "messages_dispatched_total",
            "Mailbox enqueue attempts during dispatch",
        )
        .namespace("chat_hub"),
        &["outcome"], // "delivered", "dropped_slow_consumer"
    )
    .expect("Failed to create MESSAGES_DISPATCHED metric")
});

/// Relay traffic counters
pub static RELAY_MESSAGES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("relay_messages_total", "Messages crossing the relay")
            .namespace("chat_hub"),
        &["direction"], // "published", "received"
    )
    .expect("Failed to create RELAY_MESSAGES metric")
});

/// Message page cache counters
pub static CACHE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cache_requests_total", "Message page cache lookups")
            .namespace("chat_hub"),
        &["result"], // "hit", "miss"
    )
    .expect("Failed to create CACHE_REQUESTS metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(MESSAGES_DISPATCHED.clone()))
        .expect("Failed to register MESSAGES_DISPATCHED");
    registry
        .register(Box::new(RELAY_MESSAGES.clone()))
        .expect("Failed to register RELAY_MESSAGES");
    registry
        .register(Box::new(CACHE_REQUESTS.clone()))
        .expect("Failed to register CACHE_REQUESTS");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Metrics should be valid UTF-8")
}

/// Record a successful mailbox enqueue
pub fn record_delivered() {
    MESSAGES_DISPATCHED.with_label_values(&["delivered"]).inc();
}

/// Record a connection dropped for overflowing its mailbox
pub fn record_slow_consumer_drop() {
    MESSAGES_DISPATCHED
        .with_label_values(&["dropped_slow_consumer"])
        .inc();
}

/// Record a cache lookup outcome
pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    CACHE_REQUESTS.with_label_values(&[result]).inc();
}
