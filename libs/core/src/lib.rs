//! Teams bridge core contracts and value types.
//!
//! This crate exposes the shared data structures exchanged between the inbound route, the bot
//! event bus and the outbound channel client, together with the in-process middleware pipeline
//! used to route outgoing events.
pub mod activity;
pub mod bus;
pub mod error;
pub mod message;
pub mod middleware;

pub use activity::*;
pub use bus::*;
pub use error::*;
pub use message::*;
pub use middleware::*;

/// Channel tag carried by every event this bridge emits or accepts.
///
/// ```
/// assert_eq!(tb_core::CHANNEL_TEAMS, "teams");
/// ```
pub const CHANNEL_TEAMS: &str = "teams";
