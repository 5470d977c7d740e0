use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tb_core::{AdapterError, ConversationReference};
use tracing::debug;
use url::Url;

use crate::config::ChannelConfig;

/// Delivers activities into an existing conversation through its continuation handle.
#[async_trait]
pub trait BotAdapter: Send + Sync {
    async fn continue_conversation(
        &self,
        reference: &ConversationReference,
        activity: Value,
    ) -> Result<(), AdapterError>;
}

pub type SharedAdapter = Arc<dyn BotAdapter>;

/// Posts activities to the connector service named by each conversation reference.
pub struct ConnectorAdapter {
    http: reqwest::Client,
    app_id: String,
    bearer: Option<String>,
    timeout: Duration,
}

impl ConnectorAdapter {
    pub fn new(config: &ChannelConfig) -> anyhow::Result<Self> {
        let timeout = config.send_timeout();
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            app_id: config.app_id.clone(),
            bearer: config.connector_token.clone(),
            timeout,
        })
    }

    fn activities_url(reference: &ConversationReference) -> Result<Url, AdapterError> {
        let mut url = Url::parse(&reference.service_url)
            .map_err(|err| AdapterError::InvalidReference(format!("service url: {err}")))?;
        if reference.conversation.id.is_empty() {
            return Err(AdapterError::InvalidReference(
                "conversation id is empty".into(),
            ));
        }
        url.path_segments_mut()
            .map_err(|_| AdapterError::InvalidReference("service url cannot be a base".into()))?
            .pop_if_empty()
            .extend(["v3", "conversations", reference.conversation.id.as_str(), "activities"]);
        Ok(url)
    }

    fn transport(&self, err: reqwest::Error) -> AdapterError {
        if err.is_timeout() {
            AdapterError::Timeout(self.timeout)
        } else {
            AdapterError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl BotAdapter for ConnectorAdapter {
    async fn continue_conversation(
        &self,
        reference: &ConversationReference,
        activity: Value,
    ) -> Result<(), AdapterError> {
        let url = Self::activities_url(reference)?;
        let body = reference.apply_to(activity);

        let mut request = self.http.post(url.clone()).json(&body);
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|err| self.transport(err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!(app_id = %self.app_id, %url, status = status.as_u16(), "activity accepted by connector");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tb_core::{ChannelAccount, ConversationAccount};

    use super::*;

    fn reference(service_url: &str, conversation_id: &str) -> ConversationReference {
        ConversationReference {
            activity_id: None,
            user: Some(ChannelAccount::new("29:user")),
            bot: Some(ChannelAccount::new("28:bot")),
            conversation: ConversationAccount::new(conversation_id),
            channel_id: "msteams".into(),
            service_url: service_url.into(),
            locale: None,
        }
    }

    #[test]
    fn activities_url_appends_conversation_path() {
        let url = ConnectorAdapter::activities_url(&reference(
            "https://smba.trafficmanager.net/emea/",
            "a:thread-1",
        ))
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://smba.trafficmanager.net/emea/v3/conversations/a:thread-1/activities"
        );
    }

    #[test]
    fn activities_url_keeps_thread_suffixes() {
        let url = ConnectorAdapter::activities_url(&reference(
            "https://smba.test",
            "19:abc@thread.v2;messageid=1",
        ))
        .unwrap();
        assert_eq!(
            url.path(),
            "/v3/conversations/19:abc@thread.v2;messageid=1/activities"
        );
    }

    #[test]
    fn bad_service_url_is_an_invalid_reference() {
        let err = ConnectorAdapter::activities_url(&reference("not a url", "a:1")).unwrap_err();
        assert!(matches!(err, AdapterError::InvalidReference(_)));
    }
}
