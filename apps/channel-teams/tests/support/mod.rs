#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tb_channel_teams::{BotAdapter, ChannelClient, ChannelConfig, ClientRegistry};
use tb_core::{Activity, AdapterError, ConversationReference, InMemoryEventBus};
use tb_session::{MemoryKvStore, SharedKvStore};
use tokio::sync::Mutex;

pub const BOT_ID: &str = "bot-1";
pub const THREAD_ID: &str = "a:thread-1";

#[derive(Clone, Copy)]
pub enum Failure {
    Timeout,
    Rejected(u16),
}

/// Adapter double that records deliveries and can be told to fail.
#[derive(Default)]
pub struct RecordingAdapter {
    pub sent: Mutex<Vec<(ConversationReference, Value)>>,
    failure: Option<Failure>,
}

impl RecordingAdapter {
    pub fn failing(failure: Failure) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(failure),
        }
    }

    pub async fn deliveries(&self) -> Vec<(ConversationReference, Value)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl BotAdapter for RecordingAdapter {
    async fn continue_conversation(
        &self,
        reference: &ConversationReference,
        activity: Value,
    ) -> Result<(), AdapterError> {
        match self.failure {
            Some(Failure::Timeout) => Err(AdapterError::Timeout(Duration::from_secs(15))),
            Some(Failure::Rejected(status)) => Err(AdapterError::Rejected {
                status,
                body: "nope".into(),
            }),
            None => {
                self.sent.lock().await.push((reference.clone(), activity));
                Ok(())
            }
        }
    }
}

pub struct Harness {
    pub registry: ClientRegistry,
    pub client: Arc<ChannelClient>,
    pub adapter: Arc<RecordingAdapter>,
    pub bus: InMemoryEventBus,
    pub store: Arc<MemoryKvStore>,
}

pub fn harness(config: ChannelConfig, adapter: RecordingAdapter) -> Harness {
    let registry = ClientRegistry::new();
    let adapter = Arc::new(adapter);
    let bus = InMemoryEventBus::default();
    let store = Arc::new(MemoryKvStore::new());
    let shared_store: SharedKvStore = store.clone();
    let client = registry.mount_with_adapter(
        config,
        shared_store,
        Arc::new(bus.clone()),
        adapter.clone(),
    );
    Harness {
        registry,
        client,
        adapter,
        bus,
        store,
    }
}

pub fn default_harness() -> Harness {
    let mut config = ChannelConfig::new(BOT_ID);
    config.external_url = Some("https://bot.example.com/".into());
    harness(config, RecordingAdapter::default())
}

pub fn user_message(text: &str) -> Activity {
    serde_json::from_value(json!({
        "type": "message",
        "id": "act-1",
        "serviceUrl": "https://smba.trafficmanager.net/emea/",
        "channelId": "msteams",
        "locale": "en-US",
        "from": { "id": "29:user", "name": "Ada" },
        "recipient": { "id": "28:bot", "name": "Bridge" },
        "conversation": { "id": THREAD_ID, "tenantId": "tenant-x" },
        "channelData": { "tenant": { "id": "tenant-x" } },
        "text": text
    }))
    .expect("valid activity")
}

pub fn bot_added(locale: &str) -> Activity {
    serde_json::from_value(json!({
        "type": "conversationUpdate",
        "serviceUrl": "https://smba.trafficmanager.net/emea/",
        "channelId": "msteams",
        "locale": locale,
        "from": { "id": "29:user" },
        "recipient": { "id": "28:bot" },
        "conversation": { "id": "a:new-thread" },
        "membersAdded": [{ "id": "28:bot" }]
    }))
    .expect("valid activity")
}
