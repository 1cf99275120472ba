//! HTTP request handlers.

pub mod group;
pub mod health;
pub mod message;
