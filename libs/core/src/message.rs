use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::ChannelError;

/// Event types the Teams channel accepts on the outgoing path.
pub const SUPPORTED_OUTGOING_KINDS: [&str; 4] = ["message", "typing", "carousel", "text"];

/// Outgoing message shapes the bridge knows how to render for Teams.
///
/// ```
/// use tb_core::OutgoingMessage;
/// use serde_json::json;
///
/// let msg = OutgoingMessage::from_event("typing", &json!({})).unwrap();
/// assert_eq!(msg, OutgoingMessage::Typing);
/// assert_eq!(msg.kind(), "typing");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutgoingMessage {
    /// Raw payload forwarded untouched; shaping it is the producer's job.
    Text { payload: Value },
    Typing,
    Carousel { cards: Vec<Card> },
    QuickReplies {
        #[serde(default)]
        text: Option<String>,
        replies: Vec<Reply>,
    },
}

impl OutgoingMessage {
    /// Maps a bus event type and payload onto a message variant.
    ///
    /// `message` and `text` events become [`OutgoingMessage::QuickReplies`] when the payload
    /// carries a non-empty `quick_replies` list, and a raw [`OutgoingMessage::Text`]
    /// otherwise. Any event type outside [`SUPPORTED_OUTGOING_KINDS`] is rejected.
    pub fn from_event(kind: &str, payload: &Value) -> Result<Self, ChannelError> {
        match kind {
            "typing" => Ok(Self::Typing),
            "carousel" => {
                let carousel: CarouselPayload = serde_json::from_value(payload.clone())
                    .map_err(|source| ChannelError::InvalidPayload {
                        kind: kind.to_string(),
                        source,
                    })?;
                Ok(Self::Carousel {
                    cards: carousel.elements,
                })
            }
            "message" | "text" => {
                let choice: ChoicePayload = match serde_json::from_value(payload.clone()) {
                    Ok(choice) => choice,
                    Err(err) => {
                        if payload.get("quick_replies").or(payload.get("quickReplies")).is_some() {
                            warn!(kind, error = %err, "quick replies unreadable; sending payload as is");
                        }
                        ChoicePayload::default()
                    }
                };
                if choice.quick_replies.is_empty() {
                    Ok(Self::Text {
                        payload: payload.clone(),
                    })
                } else {
                    Ok(Self::QuickReplies {
                        text: choice.text,
                        replies: choice.quick_replies,
                    })
                }
            }
            other => Err(ChannelError::UnsupportedMessageKind(other.to_string())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Typing => "typing",
            Self::Carousel { .. } => "carousel",
            Self::QuickReplies { .. } => "quick_replies",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "picture", alias = "image")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub buttons: Vec<Button>,
}

/// Card button as produced by the bot content pipeline.
///
/// Unknown button types deserialize to [`Button::Unsupported`] and missing fields default to
/// empty strings, so one bad button never drops the card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Button {
    OpenUrl {
        #[serde(default)]
        title: String,
        #[serde(default)]
        url: String,
    },
    #[serde(rename = "say_something", alias = "say_text")]
    SayText {
        #[serde(default)]
        title: String,
        #[serde(default)]
        text: String,
    },
    Postback {
        #[serde(default)]
        title: String,
        #[serde(default)]
        payload: String,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub payload: String,
}

#[derive(Debug, Deserialize)]
struct CarouselPayload {
    #[serde(default, alias = "cards")]
    elements: Vec<Card>,
}

#[derive(Debug, Default, Deserialize)]
struct ChoicePayload {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, alias = "quickReplies")]
    quick_replies: Vec<Reply>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_event_passes_payload_through() {
        let payload = json!({ "type": "text", "text": "hi", "markdown": true });
        let msg = OutgoingMessage::from_event("text", &payload).unwrap();
        assert_eq!(msg, OutgoingMessage::Text { payload });
    }

    #[test]
    fn message_with_quick_replies_becomes_choice() {
        let payload = json!({
            "text": "Continue?",
            "quick_replies": [
                { "title": "Yes", "payload": "yes" },
                { "title": "No", "payload": "no" }
            ]
        });
        let msg = OutgoingMessage::from_event("message", &payload).unwrap();
        let OutgoingMessage::QuickReplies { text, replies } = msg else {
            panic!("expected quick replies");
        };
        assert_eq!(text.as_deref(), Some("Continue?"));
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[1].payload, "no");
    }

    #[test]
    fn empty_quick_replies_fall_back_to_text() {
        let payload = json!({ "text": "plain", "quick_replies": [] });
        let msg = OutgoingMessage::from_event("message", &payload).unwrap();
        assert_eq!(msg.kind(), "text");
    }

    #[test]
    fn carousel_parses_buttons_including_unknown() {
        let payload = json!({
            "type": "carousel",
            "elements": [{
                "title": "Shoes",
                "picture": "/media/shoes.png",
                "buttons": [
                    { "type": "open_url", "title": "Shop", "url": "https://shop.test" },
                    { "type": "say_something", "title": "Tell", "text": "tell me" },
                    { "type": "postback", "title": "Buy", "payload": "BUY_SHOES" },
                    { "type": "share", "title": "Share" }
                ]
            }]
        });
        let msg = OutgoingMessage::from_event("carousel", &payload).unwrap();
        let OutgoingMessage::Carousel { cards } = msg else {
            panic!("expected carousel");
        };
        assert_eq!(cards[0].image_url.as_deref(), Some("/media/shoes.png"));
        assert_eq!(cards[0].buttons.len(), 4);
        assert_eq!(cards[0].buttons[3], Button::Unsupported);
    }

    #[test]
    fn buttons_missing_fields_still_parse() {
        let payload = json!({
            "elements": [{
                "title": "Shoes",
                "buttons": [
                    { "type": "open_url", "title": "Open" },
                    { "type": "postback" }
                ]
            }]
        });
        let msg = OutgoingMessage::from_event("carousel", &payload).unwrap();
        let OutgoingMessage::Carousel { cards } = msg else {
            panic!("expected carousel");
        };
        assert_eq!(
            cards[0].buttons,
            vec![
                Button::OpenUrl { title: "Open".into(), url: String::new() },
                Button::Postback { title: String::new(), payload: String::new() },
            ]
        );
    }

    #[test]
    fn reply_without_payload_keeps_choices() {
        let payload = json!({
            "text": "Continue?",
            "quick_replies": [{ "title": "Yes", "payload": "yes" }, { "title": "No" }]
        });
        let msg = OutgoingMessage::from_event("message", &payload).unwrap();
        let OutgoingMessage::QuickReplies { replies, .. } = msg else {
            panic!("expected quick replies");
        };
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[1].title, "No");
        assert_eq!(replies[1].payload, "");
    }

    #[test]
    fn malformed_carousel_is_invalid_payload() {
        let payload = json!({ "elements": "nope" });
        let err = OutgoingMessage::from_event("carousel", &payload).unwrap_err();
        assert!(matches!(err, ChannelError::InvalidPayload { .. }));
    }

    #[test]
    fn unsupported_kinds_are_rejected() {
        for kind in ["image", "file", "custom", "login_prompt", ""] {
            let err = OutgoingMessage::from_event(kind, &json!({})).unwrap_err();
            assert!(
                matches!(err, ChannelError::UnsupportedMessageKind(ref k) if k == kind),
                "kind {kind} should be rejected"
            );
        }
    }
}
