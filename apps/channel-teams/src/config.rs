use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

const DEFAULT_BIND: &str = "0.0.0.0:3978";
const DEFAULT_BOT_ID: &str = "default";
const DEFAULT_SUBJECT_PREFIX: &str = "botbridge";
const DEFAULT_SEND_TIMEOUT_MS: u64 = 15_000;

/// Settings for one bot mounted on the Teams channel.
#[derive(Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    pub bot_id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub external_url: Option<String>,
    /// Welcome text keyed by locale, sent when the bot is added to a conversation.
    #[serde(default)]
    pub proactive_messages: BTreeMap<String, String>,
    #[serde(default)]
    pub connector_token: Option<String>,
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_send_timeout_ms() -> u64 {
    DEFAULT_SEND_TIMEOUT_MS
}

impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("bot_id", &self.bot_id)
            .field("enabled", &self.enabled)
            .field("app_id", &self.app_id)
            .field("tenant_id", &self.tenant_id)
            .field("external_url", &self.external_url)
            .field("proactive_messages", &self.proactive_messages.len())
            .field("connector_token", &self.connector_token.as_ref().map(|_| "<redacted>"))
            .field("send_timeout_ms", &self.send_timeout_ms)
            .finish()
    }
}

impl ChannelConfig {
    pub fn new(bot_id: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            enabled: true,
            app_id: String::new(),
            tenant_id: None,
            external_url: None,
            proactive_messages: BTreeMap::new(),
            connector_token: None,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
        }
    }

    pub fn from_env() -> Result<Self> {
        let proactive_messages = match non_empty_var("TEAMS_PROACTIVE_MESSAGES") {
            Some(raw) => serde_json::from_str(&raw)
                .context("TEAMS_PROACTIVE_MESSAGES must be a JSON object of locale to text")?,
            None => BTreeMap::new(),
        };
        let send_timeout_ms = match non_empty_var("TEAMS_SEND_TIMEOUT_MS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid TEAMS_SEND_TIMEOUT_MS: {raw}"))?,
            None => DEFAULT_SEND_TIMEOUT_MS,
        };

        Ok(Self {
            bot_id: non_empty_var("TEAMS_BOT_ID").unwrap_or_else(|| DEFAULT_BOT_ID.into()),
            enabled: true,
            app_id: non_empty_var("TEAMS_APP_ID").unwrap_or_default(),
            tenant_id: non_empty_var("TEAMS_TENANT_ID"),
            external_url: non_empty_var("TEAMS_EXTERNAL_URL"),
            proactive_messages,
            connector_token: non_empty_var("TEAMS_CONNECTOR_TOKEN"),
            send_timeout_ms,
        })
    }

    /// Parsed external base URL; `None` when unset or unparsable.
    pub fn external_base(&self) -> Option<Url> {
        self.external_url
            .as_deref()
            .and_then(|raw| Url::parse(raw).ok())
    }

    /// The platform only calls back to HTTPS endpoints.
    pub fn is_secure_external_url(&self) -> bool {
        self.external_base()
            .is_some_and(|url| url.scheme() == "https")
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Picks the welcome text for `locale`: exact match, then its language, then `en`,
    /// then whichever entry sorts first.
    pub fn welcome_text(&self, locale: Option<&str>) -> Option<&str> {
        let messages = &self.proactive_messages;
        let exact = locale.and_then(|locale| messages.get(locale));
        let language = locale
            .and_then(|locale| locale.split(['-', '_']).next())
            .and_then(|language| messages.get(language));
        exact
            .or(language)
            .or_else(|| messages.get("en"))
            .or_else(|| messages.values().next())
            .map(String::as_str)
    }
}

/// Process-level settings for the channel binary.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub addr: SocketAddr,
    pub bots: Vec<ChannelConfig>,
    pub nats_url: Option<String>,
    pub subject_prefix: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let bind = non_empty_var("TEAMS_BIND").unwrap_or_else(|| DEFAULT_BIND.into());
        let addr = bind
            .parse()
            .with_context(|| format!("invalid TEAMS_BIND address: {bind}"))?;
        let bots = match non_empty_var("TEAMS_BOTS_FILE") {
            Some(path) => load_bots_file(Path::new(&path))?,
            None => vec![ChannelConfig::from_env()?],
        };

        Ok(Self {
            addr,
            bots,
            nats_url: non_empty_var("NATS_URL"),
            subject_prefix: non_empty_var("BUS_SUBJECT_PREFIX")
                .unwrap_or_else(|| DEFAULT_SUBJECT_PREFIX.into()),
        })
    }
}

pub fn load_bots_file(path: &Path) -> Result<Vec<ChannelConfig>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read bots file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid bots file {}", path.display()))
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
