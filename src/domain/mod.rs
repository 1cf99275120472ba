//! # Domain Layer
//!
//! The domain layer contains the core business objects of the chat hub.
//! It is independent of any external frameworks or infrastructure
//! concerns.
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts
//! - Entities encapsulate domain behavior (scope targeting lives on
//!   `Message` itself)

pub mod entities;

// Re-export commonly used types
pub use entities::*;
