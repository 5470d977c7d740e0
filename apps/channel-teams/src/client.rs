use std::sync::{Arc, OnceLock};

use metrics::counter;
use serde_json::json;
use tb_core::{Activity, BusEvent, CHANNEL_TEAMS, ChannelError, OutgoingMessage, SharedBus};
use tb_session::ConversationReferenceCache;
use tb_translator::{TranslateContext, to_teams_activity};
use tracing::{Instrument, debug, error, info, info_span, warn};
use url::Url;

use crate::adapter::SharedAdapter;
use crate::config::ChannelConfig;

/// What became of one inbound activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// An incoming event was emitted on the bus.
    Published,
    /// The bot was added and the welcome message went out.
    Welcomed,
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    ForeignTenant,
    MissingConversation,
    MissingSender,
    NoText,
    NoWelcomeConfigured,
}

impl DropReason {
    fn as_str(&self) -> &'static str {
        match self {
            DropReason::ForeignTenant => "foreign_tenant",
            DropReason::MissingConversation => "missing_conversation",
            DropReason::MissingSender => "missing_sender",
            DropReason::NoText => "no_text",
            DropReason::NoWelcomeConfigured => "no_welcome",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// No continuation handle is known for the thread; nothing was sent.
    MissingReference,
}

/// Per-bot Teams channel: records continuation handles from inbound traffic and uses them to
/// deliver outgoing bus events.
pub struct ChannelClient {
    config: ChannelConfig,
    external_url: Option<Url>,
    cache: Arc<ConversationReferenceCache>,
    bus: SharedBus,
    adapter: OnceLock<SharedAdapter>,
}

impl ChannelClient {
    pub fn new(config: ChannelConfig, cache: Arc<ConversationReferenceCache>, bus: SharedBus) -> Self {
        let external_url = config.external_base();
        Self {
            config,
            external_url,
            cache,
            bus,
            adapter: OnceLock::new(),
        }
    }

    pub fn bot_id(&self) -> &str {
        &self.config.bot_id
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ConversationReferenceCache> {
        &self.cache
    }

    pub fn is_initialized(&self) -> bool {
        self.adapter.get().is_some()
    }

    /// Installs the platform adapter. Returns `false` if one was already installed, in which
    /// case the new adapter is discarded.
    pub fn initialize(&self, adapter: SharedAdapter) -> bool {
        if !self.config.is_secure_external_url() {
            warn!(
                bot_id = %self.config.bot_id,
                external_url = self.config.external_url.as_deref().unwrap_or_default(),
                "teams requires an https external url; inbound webhooks will not reach this bot"
            );
        }
        if self.adapter.set(adapter).is_err() {
            warn!(bot_id = %self.config.bot_id, "teams channel already initialized");
            return false;
        }
        info!(bot_id = %self.config.bot_id, "teams channel initialized");
        true
    }

    fn adapter(&self) -> Result<&SharedAdapter, ChannelError> {
        self.adapter
            .get()
            .ok_or_else(|| ChannelError::NotInitialized(self.config.bot_id.clone()))
    }

    pub async fn on_inbound_activity(
        &self,
        activity: Activity,
    ) -> Result<InboundOutcome, ChannelError> {
        let span = info_span!(
            "teams.activity",
            bot_id = %self.config.bot_id,
            activity_type = %activity.r#type,
            thread_id = activity.conversation_id().unwrap_or_default()
        );
        async move {
            counter!("teams_activities_received_total", "bot_id" => self.config.bot_id.clone())
                .increment(1);
            let outcome = self.handle_inbound(&activity).await?;
            if let InboundOutcome::Dropped(reason) = outcome {
                counter!(
                    "teams_activities_dropped_total",
                    "bot_id" => self.config.bot_id.clone(),
                    "reason" => reason.as_str()
                )
                .increment(1);
                debug!(reason = reason.as_str(), "inbound activity dropped");
            }
            Ok::<_, ChannelError>(outcome)
        }
        .instrument(span)
        .await
    }

    async fn handle_inbound(&self, activity: &Activity) -> Result<InboundOutcome, ChannelError> {
        if let Some(expected) = self.config.tenant_id.as_deref() {
            if activity.tenant_id() != Some(expected) {
                return Ok(InboundOutcome::Dropped(DropReason::ForeignTenant));
            }
        }

        if activity.is_bot_added() {
            return self.send_welcome(activity).await;
        }

        let Some(thread_id) = activity.conversation_id() else {
            return Ok(InboundOutcome::Dropped(DropReason::MissingConversation));
        };
        let Some(sender_id) = activity.sender_id() else {
            return Ok(InboundOutcome::Dropped(DropReason::MissingSender));
        };
        let Some(text) = activity.text_content() else {
            return Ok(InboundOutcome::Dropped(DropReason::NoText));
        };

        match activity.conversation_reference() {
            Some(reference) => {
                self.cache.record(thread_id, reference).await?;
            }
            None => warn!(thread_id, "activity carries no service url; replies cannot be delivered"),
        }

        let event = BusEvent::incoming_text(
            self.config.bot_id.as_str(),
            CHANNEL_TEAMS,
            thread_id,
            sender_id,
            activity.r#type.as_str(),
            text,
        );
        self.bus.send_event(event).await.map_err(ChannelError::Bus)?;
        Ok(InboundOutcome::Published)
    }

    /// Greets a conversation the bot was just added to, using the handle carried by the
    /// activity itself. Nothing is recorded in the cache.
    async fn send_welcome(&self, activity: &Activity) -> Result<InboundOutcome, ChannelError> {
        let Some(text) = self.config.welcome_text(activity.locale.as_deref()) else {
            return Ok(InboundOutcome::Dropped(DropReason::NoWelcomeConfigured));
        };
        let Some(reference) = activity.conversation_reference() else {
            return Ok(InboundOutcome::Dropped(DropReason::MissingConversation));
        };
        let adapter = self.adapter()?;
        adapter
            .continue_conversation(&reference, json!({ "type": "message", "text": text }))
            .await?;
        info!(thread_id = reference.thread_id(), "welcome message sent");
        Ok(InboundOutcome::Welcomed)
    }

    /// Delivers one outgoing bus event to the thread it names.
    ///
    /// Unsupported kinds fail before any lookup or delivery. A thread with no known handle is
    /// logged and skipped without error. Adapter failures are logged and returned unchanged
    /// inside [`ChannelError::Delivery`].
    pub async fn send_outgoing_event(&self, event: &BusEvent) -> Result<SendOutcome, ChannelError> {
        let span = info_span!(
            "teams.send",
            bot_id = %self.config.bot_id,
            kind = %event.kind,
            thread_id = event.thread_id.as_deref().unwrap_or_default()
        );
        self.deliver(event).instrument(span).await
    }

    async fn deliver(&self, event: &BusEvent) -> Result<SendOutcome, ChannelError> {
        let message = OutgoingMessage::from_event(&event.kind, &event.payload)?;

        let thread_id = event.thread_id.as_deref().unwrap_or_default();
        let reference = if thread_id.is_empty() {
            None
        } else {
            self.cache.resolve(thread_id).await?
        };
        let Some(reference) = reference else {
            counter!("teams_missing_reference_total", "bot_id" => self.config.bot_id.clone())
                .increment(1);
            warn!(thread_id, "no conversation reference for thread; message not sent");
            return Ok(SendOutcome::MissingReference);
        };

        let adapter = self.adapter()?;
        let ctx = TranslateContext {
            bot_id: &self.config.bot_id,
            thread_id,
            external_url: self.external_url.as_ref(),
        };
        let activity = to_teams_activity(&message, &ctx);

        if let Err(err) = adapter.continue_conversation(&reference, activity).await {
            counter!("teams_send_errors_total", "bot_id" => self.config.bot_id.clone()).increment(1);
            error!(kind = %event.kind, error = %err, "failed to send teams activity");
            return Err(ChannelError::Delivery(err));
        }

        counter!(
            "teams_messages_sent_total",
            "bot_id" => self.config.bot_id.clone(),
            "kind" => message.kind()
        )
        .increment(1);
        Ok(SendOutcome::Delivered)
    }
}
