//! Helpers for translating bridge messages into Teams wire payloads.
//!
//! The entry point is [`teams::to_teams_activity`], a pure mapping from an
//! [`OutgoingMessage`](tb_core::OutgoingMessage) to the JSON activity the connector expects.
//! Translation never fails: shapes the platform rejects surface when the adapter delivers.

pub mod teams;
mod telemetry;

pub use teams::{HERO_CARD_CONTENT_TYPE, TranslateContext, to_teams_activity};
