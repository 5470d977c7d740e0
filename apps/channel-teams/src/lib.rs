//! Teams channel for the bot event bus.
//!
//! Inbound activities arrive on the axum route, their continuation handles are cached per
//! bot, and a text event is emitted on the bus. Outgoing bus events reach
//! [`ChannelClient::send_outgoing_event`] through the `teams.sendMessages` middleware, are
//! rendered as Teams activities and posted through the conversation's connector service.

pub mod adapter;
pub mod binding;
pub mod client;
pub mod config;
pub mod http;
#[cfg(feature = "nats")]
pub mod nats;
pub mod registry;

pub use adapter::{BotAdapter, ConnectorAdapter, SharedAdapter};
pub use binding::{MIDDLEWARE_NAME, TeamsOutgoingMiddleware, register_outgoing};
pub use client::{ChannelClient, DropReason, InboundOutcome, SendOutcome};
pub use config::{ChannelConfig, ServiceConfig};
pub use http::{AppState, RouteError, router};
pub use registry::ClientRegistry;
