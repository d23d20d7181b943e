//! Inbound stream events, decoded once at the boundary.
//!
//! The server sends loosely typed JSON frames. Each text frame becomes one
//! `StreamEvent`: either one of the two shapes the unread tally cares about,
//! an `Unrecognized` frame that is skipped quietly, or a `Malformed` one that
//! is logged and dropped.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::constants::{events, SYSTEM_POST_PREFIX};
use crate::models::ConversationKind;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Posted(PostedEvent),
    ChannelsViewed(ChannelsViewedEvent),
    /// Any other event, or a reply to one of our own requests (no event name)
    Unrecognized { kind: Option<String> },
    Malformed { kind: String, reason: String },
}

/// A new message in a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct PostedEvent {
    pub conversation_id: String,
    pub kind: ConversationKind,
    pub post: Post,
    /// User IDs mentioned by the message. Empty when absent or undecodable.
    pub mentions: Vec<String>,
}

impl PostedEvent {
    pub fn is_reply(&self) -> bool {
        self.post.is_reply()
    }

    pub fn mentions_user(&self, user_id: &str) -> bool {
        self.mentions.iter().any(|m| m == user_id)
    }
}

/// The subset of a message body that matters for counting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub channel_id: String,
    /// Thread root this message replies to; empty for a root message
    #[serde(default)]
    pub root_id: String,
    #[serde(rename = "type", default)]
    pub post_type: String,
}

impl Post {
    pub fn is_reply(&self) -> bool {
        !self.root_id.is_empty()
    }

    /// Server-generated notices such as join/leave messages.
    pub fn is_system(&self) -> bool {
        self.post_type.starts_with(SYSTEM_POST_PREFIX)
    }
}

/// The user caught up on one or more conversations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelsViewedEvent {
    pub conversation_ids: Vec<String>,
}

/// Just the event name, so frames we do not track are never decoded further.
#[derive(Debug, Deserialize)]
struct RawHeader {
    #[serde(default)]
    event: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: Map<String, Value>,
    #[serde(default)]
    broadcast: RawBroadcast,
}

#[derive(Debug, Default, Deserialize)]
struct RawBroadcast {
    #[serde(default)]
    channel_id: String,
}

impl StreamEvent {
    /// Decode one text frame.
    pub fn decode(text: &str) -> Self {
        let header: RawHeader = match serde_json::from_str(text) {
            Ok(header) => header,
            Err(e) => return malformed("", format!("invalid frame: {}", e)),
        };

        let kind = match header.event.as_deref() {
            Some(kind @ (events::POSTED | events::MULTIPLE_CHANNELS_VIEWED)) => kind,
            _ => return StreamEvent::Unrecognized { kind: header.event },
        };

        let frame: RawFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => return malformed(kind, format!("invalid frame: {}", e)),
        };
        if kind == events::POSTED {
            decode_posted(frame)
        } else {
            decode_viewed(&frame.data)
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            StreamEvent::Posted(_) => events::POSTED,
            StreamEvent::ChannelsViewed(_) => events::MULTIPLE_CHANNELS_VIEWED,
            StreamEvent::Unrecognized { kind } => kind.as_deref().unwrap_or(""),
            StreamEvent::Malformed { kind, .. } => kind,
        }
    }
}

fn malformed(kind: &str, reason: impl Into<String>) -> StreamEvent {
    StreamEvent::Malformed {
        kind: kind.to_string(),
        reason: reason.into(),
    }
}

fn decode_posted(frame: RawFrame) -> StreamEvent {
    let data = frame.data;

    let Some(raw_post) = data.get("post").and_then(Value::as_str) else {
        return malformed(events::POSTED, "post is not a string");
    };
    let post: Post = match serde_json::from_str(raw_post) {
        Ok(post) => post,
        Err(e) => return malformed(events::POSTED, format!("could not decode post: {}", e)),
    };

    let conversation_id = if frame.broadcast.channel_id.is_empty() {
        post.channel_id.clone()
    } else {
        frame.broadcast.channel_id
    };
    if conversation_id.is_empty() {
        return malformed(events::POSTED, "no conversation id");
    }

    let kind = data
        .get("channel_type")
        .and_then(Value::as_str)
        .map(ConversationKind::from_channel_type)
        .unwrap_or(ConversationKind::Other);

    StreamEvent::Posted(PostedEvent {
        conversation_id,
        kind,
        post,
        mentions: decode_mentions(data.get("mentions")),
    })
}

/// Mentions arrive as a JSON-encoded string array. Anything unusable means
/// "nobody mentioned".
fn decode_mentions(raw: Option<&Value>) -> Vec<String> {
    let Some(raw) = raw.and_then(Value::as_str).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(mentions) => mentions,
        Err(e) => {
            warn!(error = %e, "Could not decode mentions");
            Vec::new()
        }
    }
}

fn decode_viewed(data: &Map<String, Value>) -> StreamEvent {
    match data.get("channel_times").and_then(Value::as_object) {
        Some(times) => StreamEvent::ChannelsViewed(ChannelsViewedEvent {
            conversation_ids: times.keys().cloned().collect(),
        }),
        None => malformed(events::MULTIPLE_CHANNELS_VIEWED, "channel_times is not an object"),
    }
}
