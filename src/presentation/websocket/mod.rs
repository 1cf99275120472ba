//! Real-time delivery: the connection hub, inbound frame parsing, and
//! per-connection session handling.

pub mod frames;
pub mod hub;
pub mod session;

pub use frames::InboundFrame;
pub use hub::{Connection, Hub, HubHandle};
pub use session::ws_handler;
