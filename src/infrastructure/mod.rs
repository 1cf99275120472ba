//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL)
//! - Cache implementations (Redis)
//! - Cross-instance relay (Redis pub/sub)
//! - Prometheus metrics

pub mod cache;
pub mod database;
pub mod metrics;
pub mod relay;
pub mod repositories;
