//! Renders [`OutgoingMessage`] values as Teams activities with hero-card attachments.

use serde_json::{Map, Value, json};
use tb_core::{Button, Card, OutgoingMessage, Reply};
use url::Url;

use crate::telemetry::translate_with_span;

pub const HERO_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.hero";

/// Labels and settings for one translation.
#[derive(Debug, Clone, Copy)]
pub struct TranslateContext<'a> {
    pub bot_id: &'a str,
    pub thread_id: &'a str,
    /// Base used to resolve relative card image paths.
    pub external_url: Option<&'a Url>,
}

/// Converts an [`OutgoingMessage`] into a Teams activity payload.
///
/// ```
/// use tb_core::{OutgoingMessage, Reply};
/// use tb_translator::{TranslateContext, to_teams_activity};
///
/// let ctx = TranslateContext { bot_id: "bot-1", thread_id: "a:1", external_url: None };
/// let msg = OutgoingMessage::QuickReplies {
///     text: Some("Ready?".into()),
///     replies: vec![Reply { title: "Yes".into(), payload: "yes".into() }],
/// };
/// let activity = to_teams_activity(&msg, &ctx);
/// assert_eq!(activity["text"], "Ready?");
/// assert_eq!(activity["attachments"][0]["content"]["buttons"][0]["value"], "yes");
/// ```
pub fn to_teams_activity(message: &OutgoingMessage, ctx: &TranslateContext<'_>) -> Value {
    translate_with_span(ctx, message.kind(), || match message {
        OutgoingMessage::Typing => json!({ "type": "typing" }),
        OutgoingMessage::Carousel { cards } => carousel(cards, ctx.external_url),
        OutgoingMessage::QuickReplies { text, replies } => choices(text.as_deref(), replies),
        OutgoingMessage::Text { payload } => payload.clone(),
    })
}

fn carousel(cards: &[Card], external_url: Option<&Url>) -> Value {
    let attachments: Vec<Value> = cards
        .iter()
        .map(|card| {
            let images: Vec<Value> = card
                .image_url
                .as_deref()
                .map(|raw| vec![json!({ "url": resolve_image_url(raw, external_url) })])
                .unwrap_or_default();
            let buttons: Vec<Value> = card.buttons.iter().map(button_action).collect();
            hero_card(&card.title, images, buttons)
        })
        .collect();

    json!({
        "type": "message",
        "attachmentLayout": "carousel",
        "attachments": attachments
    })
}

/// Maps a card button to a card action.
///
/// [`Button::Unsupported`] yields `null`, leaving a hole in the action list instead of
/// failing the whole card.
fn button_action(button: &Button) -> Value {
    match button {
        Button::OpenUrl { title, url } => json!({
            "type": "openUrl",
            "title": title,
            "value": url
        }),
        Button::SayText { title, text } => json!({
            "type": "messageBack",
            "title": title,
            "value": text,
            "text": text,
            "displayText": text
        }),
        Button::Postback { title, payload } => json!({
            "type": "messageBack",
            "title": title,
            "value": payload,
            "text": payload
        }),
        Button::Unsupported => Value::Null,
    }
}

fn choices(text: Option<&str>, replies: &[Reply]) -> Value {
    let buttons: Vec<Value> = replies
        .iter()
        .map(|reply| {
            json!({
                "type": "messageBack",
                "title": reply.title,
                "value": reply.payload,
                "text": reply.payload,
                "displayText": reply.title
            })
        })
        .collect();

    let mut activity = Map::new();
    activity.insert("type".into(), json!("message"));
    if let Some(text) = text {
        activity.insert("text".into(), json!(text));
    }
    activity.insert(
        "attachments".into(),
        json!([hero_card("", Vec::new(), buttons)]),
    );
    Value::Object(activity)
}

fn hero_card(title: &str, images: Vec<Value>, buttons: Vec<Value>) -> Value {
    json!({
        "contentType": HERO_CARD_CONTENT_TYPE,
        "content": {
            "title": title,
            "images": images,
            "buttons": buttons
        }
    })
}

/// Absolute URLs pass through; relative paths are joined onto the external base when known.
fn resolve_image_url(raw: &str, external_url: Option<&Url>) -> String {
    if Url::parse(raw).is_ok() {
        return raw.to_string();
    }
    external_url
        .and_then(|base| base.join(raw).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| raw.to_string())
}
