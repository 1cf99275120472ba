//! # Chat Hub Library
//!
//! This crate provides a real-time chat backend with:
//! - WebSocket sessions for public, private, and group messaging
//! - A per-process connection hub with non-blocking fanout
//! - PostgreSQL for persistent message history
//! - Redis for page caching and cross-instance relay
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Core business entities and repository traits
//! - **Application Layer**: Delivery, history, and group services
//! - **Infrastructure Layer**: Database, cache, relay, and metrics
//! - **Presentation Layer**: HTTP handlers and WebSocket sessions
//!
//! ## Module Structure
//!
//! ```text
//! chat_hub/
//! +-- config/        Configuration management
//! +-- domain/        Domain entities and repository traits
//! +-- application/   Application services
//! +-- infrastructure/ Database, cache, relay, metrics
//! +-- presentation/  HTTP routes, middleware, WebSocket sessions
//! +-- shared/        Common utilities (errors)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
