use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use time::OffsetDateTime;

/// Channel identifier the connector service stamps on Teams activities.
pub const DEFAULT_CHANNEL_ID: &str = "msteams";

/// Platform activity as delivered to the inbound route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default)]
    pub id: Option<String>,
    pub r#type: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
    #[serde(default)]
    pub from: Option<ChannelAccount>,
    #[serde(default)]
    pub recipient: Option<ChannelAccount>,
    #[serde(default)]
    pub conversation: Option<ConversationAccount>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub members_added: Vec<ChannelAccount>,
    #[serde(default)]
    pub channel_data: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub service_url: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Activity {
    /// Creates a new activity with the provided type and empty payload.
    pub fn new(r#type: impl Into<String>) -> Self {
        Self {
            id: None,
            r#type: r#type.into(),
            timestamp: None,
            from: None,
            recipient: None,
            conversation: None,
            text: None,
            attachments: Vec::new(),
            members_added: Vec::new(),
            channel_data: None,
            value: None,
            locale: None,
            service_url: None,
            channel_id: None,
            extra: Map::new(),
        }
    }

    /// Text body of the activity, `None` when absent or empty.
    pub fn text_content(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.is_empty())
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation
            .as_ref()
            .map(|conversation| conversation.id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn sender_id(&self) -> Option<&str> {
        self.from.as_ref().map(|from| from.id.as_str())
    }

    /// Tenant the activity originates from, read from `channelData.tenant.id` first.
    pub fn tenant_id(&self) -> Option<&str> {
        self.channel_data
            .as_ref()
            .and_then(|data| data.pointer("/tenant/id"))
            .and_then(Value::as_str)
            .or_else(|| {
                self.conversation
                    .as_ref()
                    .and_then(|conversation| conversation.tenant_id.as_deref())
            })
    }

    /// True for a `conversationUpdate` announcing that the bot itself joined.
    pub fn is_bot_added(&self) -> bool {
        if !self.r#type.eq_ignore_ascii_case("conversationUpdate") {
            return false;
        }
        let Some(bot) = self.recipient.as_ref() else {
            return false;
        };
        self.members_added.iter().any(|member| member.id == bot.id)
    }

    /// Extracts the continuation handle needed to push messages into this conversation later.
    ///
    /// Returns `None` when the activity lacks the conversation or service URL required to
    /// resume the thread.
    pub fn conversation_reference(&self) -> Option<ConversationReference> {
        let conversation = self.conversation.clone().filter(|c| !c.id.is_empty())?;
        let service_url = self.service_url.clone().filter(|url| !url.is_empty())?;
        Some(ConversationReference {
            activity_id: self.id.clone(),
            user: self.from.clone(),
            bot: self.recipient.clone(),
            conversation,
            channel_id: self
                .channel_id
                .clone()
                .unwrap_or_else(|| DEFAULT_CHANNEL_ID.to_string()),
            service_url,
            locale: self.locale.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad_object_id: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_group: Option<bool>,
}

impl ConversationAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Continuation handle for a conversation thread.
///
/// Issued implicitly by the platform on first inbound contact. The bridge never builds one
/// from scratch; it only extracts, caches and forwards it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<ChannelAccount>,
    pub conversation: ConversationAccount,
    pub channel_id: String,
    pub service_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl ConversationReference {
    pub fn thread_id(&self) -> &str {
        &self.conversation.id
    }

    /// Stamps the addressing fields of this reference onto an outgoing wire payload.
    ///
    /// Non-object payloads are wrapped: strings become message text, anything else is
    /// carried as the activity `value`.
    pub fn apply_to(&self, payload: Value) -> Value {
        let mut activity = match payload {
            Value::Object(map) => map,
            Value::String(text) => {
                let mut map = Map::new();
                map.insert("text".into(), Value::String(text));
                map
            }
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other);
                map
            }
        };

        activity
            .entry("type")
            .or_insert_with(|| Value::String("message".into()));
        activity.insert("channelId".into(), json!(self.channel_id));
        activity.insert("serviceUrl".into(), json!(self.service_url));
        activity.insert("conversation".into(), json!(self.conversation));
        if let Some(bot) = &self.bot {
            activity.insert("from".into(), json!(bot));
        }
        if let Some(user) = &self.user {
            activity.insert("recipient".into(), json!(user));
        }
        if let Some(locale) = &self.locale {
            activity
                .entry("locale")
                .or_insert_with(|| Value::String(locale.clone()));
        }
        Value::Object(activity)
    }
}
