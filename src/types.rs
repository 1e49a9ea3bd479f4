//! Message types for the LINE Messaging API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Webhook Payload (from LINE)
// =============================================================================

/// Body of a webhook delivery
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookPayload {
    /// Bot user ID that received the events
    #[serde(default)]
    pub destination: Option<String>,
    pub events: Vec<Event>,
}

/// Webhook event, discriminated by its `type` field
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Message(MessageEvent),
    Follow(BaseEvent),
    Unfollow(BaseEvent),
    Postback(PostbackEvent),
    /// Any event kind this bot does not act on (join, leave, beacon, ...)
    #[serde(other)]
    Unsupported,
}

impl Event {
    /// Event kind as sent by LINE
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Message(_) => "message",
            Event::Follow(_) => "follow",
            Event::Unfollow(_) => "unfollow",
            Event::Postback(_) => "postback",
            Event::Unsupported => "unsupported",
        }
    }

    /// One-time reply token, if the event kind carries one
    pub fn reply_token(&self) -> Option<&str> {
        match self {
            Event::Message(e) => e.reply_token.as_deref(),
            Event::Follow(e) | Event::Unfollow(e) => e.reply_token.as_deref(),
            Event::Postback(e) => e.reply_token.as_deref(),
            Event::Unsupported => None,
        }
    }
}

/// Fields shared by simple events
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEvent {
    #[serde(default)]
    pub reply_token: Option<String>,
    /// Milliseconds since epoch
    pub timestamp: i64,
    #[serde(default)]
    pub source: Option<Source>,
}

/// A user sent a message
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    /// Absent for events delivered while the channel is in standby
    #[serde(default)]
    pub reply_token: Option<String>,
    /// Milliseconds since epoch
    pub timestamp: i64,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub webhook_event_id: Option<String>,
    #[serde(default)]
    pub mode: Option<ChannelMode>,
    pub message: MessageContent,
}

/// Channel state at the time the event was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    Active,
    Standby,
    #[serde(other)]
    Unknown,
}

impl MessageEvent {
    /// Time the user sent the message
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// True when another module owns the chat and this channel must not reply
    pub fn is_standby(&self) -> bool {
        self.mode == Some(ChannelMode::Standby)
    }

    /// Text of the message, if it is a text message
    pub fn text(&self) -> Option<&str> {
        match &self.message {
            MessageContent::Text(text) => Some(text.text.as_str()),
            _ => None,
        }
    }
}

/// A user tapped a postback action
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostbackEvent {
    #[serde(default)]
    pub reply_token: Option<String>,
    pub timestamp: i64,
    #[serde(default)]
    pub source: Option<Source>,
    pub postback: Postback,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Postback {
    pub data: String,
}

/// Where an event came from
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Source {
    #[serde(rename_all = "camelCase")]
    User { user_id: Option<String> },
    #[serde(rename_all = "camelCase")]
    Group {
        group_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Room {
        room_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
}

/// Content of a message event
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    Text(TextMessageContent),
    Image(MediaMessageContent),
    Video(MediaMessageContent),
    Audio(MediaMessageContent),
    Sticker(StickerMessageContent),
    /// File, location and future content kinds
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMessageContent {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub quote_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaMessageContent {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StickerMessageContent {
    pub id: String,
    pub package_id: String,
    pub sticker_id: String,
}

// =============================================================================
// Reply API (to LINE)
// =============================================================================

/// Request body for `POST /v2/bot/message/reply`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyMessageRequest {
    pub reply_token: String,
    pub messages: Vec<OutgoingMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_disabled: Option<bool>,
}

impl ReplyMessageRequest {
    /// Single text message reply
    pub fn text(reply_token: &str, text: &str) -> Self {
        Self {
            reply_token: reply_token.to_string(),
            messages: vec![OutgoingMessage::Text {
                text: text.to_string(),
            }],
            notification_disabled: None,
        }
    }
}

/// Message sent by the bot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingMessage {
    Text { text: String },
}

/// Error body returned by the LINE API
#[derive(Debug, Clone, Deserialize)]
pub struct LineApiError {
    pub message: String,
    #[serde(default)]
    pub details: Vec<LineApiErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineApiErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub property: Option<String>,
}
