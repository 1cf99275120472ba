//! # Domain Entities
//!
//! Core domain entities representing the main business objects in the
//! chat hub. All entities map directly to their corresponding database
//! tables.
//!
//! ## Core Entities
//!
//! - **Message**: An immutable chat message (public, private, or group)
//! - **Group**: A named chat group with membership roles
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access
//! operations. These traits are implemented in the infrastructure
//! layer, following the dependency inversion principle.

mod group;
mod message;

// Re-export Message entity and related types
pub use message::{Message, MessageDraft, MessageKind, MessageRepository};

// Re-export Group entity and related types
pub use group::{Group, GroupDraft, GroupRepository, GroupRole};

#[cfg(test)]
pub use group::MockGroupRepository;
#[cfg(test)]
pub use message::MockMessageRepository;
