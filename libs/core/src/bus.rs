use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }
}

/// Event descriptor exchanged with the bot event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BusEvent {
    #[serde(default = "new_event_id")]
    pub id: String,
    pub bot_id: String,
    pub channel: String,
    pub direction: Direction,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

fn new_event_id() -> String {
    Uuid::new_v4().to_string()
}

impl BusEvent {
    /// Builds the incoming event emitted for a user text message.
    ///
    /// ```
    /// use tb_core::{BusEvent, Direction};
    ///
    /// let event = BusEvent::incoming_text("bot-1", "teams", "a:thread", "29:user", "message", "hi");
    /// assert_eq!(event.direction, Direction::Incoming);
    /// assert_eq!(event.payload["text"], "hi");
    /// assert_eq!(event.preview.as_deref(), Some("hi"));
    /// ```
    pub fn incoming_text(
        bot_id: impl Into<String>,
        channel: impl Into<String>,
        thread_id: impl Into<String>,
        target: impl Into<String>,
        kind: impl Into<String>,
        text: &str,
    ) -> Self {
        Self {
            id: new_event_id(),
            bot_id: bot_id.into(),
            channel: channel.into(),
            direction: Direction::Incoming,
            kind: kind.into(),
            payload: json!({ "text": text }),
            preview: Some(text.to_string()),
            thread_id: Some(thread_id.into()),
            target: Some(target.into()),
        }
    }

    pub fn outgoing(
        bot_id: impl Into<String>,
        channel: impl Into<String>,
        thread_id: impl Into<String>,
        kind: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: new_event_id(),
            bot_id: bot_id.into(),
            channel: channel.into(),
            direction: Direction::Outgoing,
            kind: kind.into(),
            payload,
            preview: None,
            thread_id: Some(thread_id.into()),
            target: None,
        }
    }
}

/// Bus subject naming for bridged events.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subject(String);

impl Subject {
    pub fn incoming(prefix: &str, bot_id: &str) -> Self {
        Self::for_direction(prefix, bot_id, Direction::Incoming)
    }

    pub fn outgoing(prefix: &str, bot_id: &str) -> Self {
        Self::for_direction(prefix, bot_id, Direction::Outgoing)
    }

    /// Subject matching outgoing events of every bot.
    pub fn outgoing_all(prefix: &str) -> Self {
        Self(format!("{}.*.events.outgoing", prefix.to_lowercase()))
    }

    fn for_direction(prefix: &str, bot_id: &str, direction: Direction) -> Self {
        Self(format!(
            "{prefix}.{bot}.events.{direction}",
            prefix = prefix.to_lowercase(),
            bot = bot_id.to_lowercase(),
            direction = direction.as_str()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn send_event(&self, event: BusEvent) -> Result<()>;
}

pub type SharedBus = Arc<dyn EventBus>;

#[derive(Clone, Default)]
pub struct NoopBus;

#[async_trait]
impl EventBus for NoopBus {
    async fn send_event(&self, event: BusEvent) -> Result<()> {
        debug!(
            target = "teams.bus",
            bot_id = %event.bot_id,
            kind = %event.kind,
            "dropping event (noop bus)"
        );
        Ok(())
    }
}

/// Bus that records every event; used by tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    sent: Arc<Mutex<Vec<BusEvent>>>,
}

impl InMemoryEventBus {
    pub async fn take_sent(&self) -> Vec<BusEvent> {
        let mut guard = self.sent.lock().await;
        std::mem::take(&mut *guard)
    }

    pub async fn len(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn send_event(&self, event: BusEvent) -> Result<()> {
        self.sent.lock().await.push(event);
        Ok(())
    }
}
