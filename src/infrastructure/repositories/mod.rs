//! Repository Implementations
//!
//! PostgreSQL implementations of the domain repository traits.

mod group_repository;
mod message_repository;

pub use group_repository::PgGroupRepository;
pub use message_repository::PgMessageRepository;
