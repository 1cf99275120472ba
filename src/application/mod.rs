//! Application layer: use cases that orchestrate domain entities,
//! repositories, cache and the connection hub.

pub mod services;

pub use services::*;
