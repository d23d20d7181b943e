use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::channel_types;

/// Conversation ID -> counters. Insertion order is irrelevant.
pub type Aggregate = HashMap<String, ConversationCounters>;

/// Which unread bucket a conversation feeds.
///
/// Public and private channels collapse into `Channel`. Anything the server
/// reports that we do not recognise is `Other` and feeds no bucket, though
/// its replies and mentions still count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum ConversationKind {
    Direct,
    Group,
    Channel,
    Other,
}

impl ConversationKind {
    pub fn from_channel_type(tag: &str) -> Self {
        match tag {
            channel_types::DIRECT => ConversationKind::Direct,
            channel_types::GROUP => ConversationKind::Group,
            channel_types::OPEN | channel_types::PRIVATE => ConversationKind::Channel,
            _ => ConversationKind::Other,
        }
    }
}

impl From<String> for ConversationKind {
    fn from(tag: String) -> Self {
        Self::from_channel_type(&tag)
    }
}

/// Unread counters for a single conversation.
///
/// Signed on purpose: a negative value means the server totals and the
/// membership record disagree, and the reporter surfaces it instead of
/// clamping it away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversationCounters {
    pub direct_unread: i64,
    pub group_unread: i64,
    pub channel_unread: i64,
    pub mention_unread: i64,
    pub reply_unread: i64,
}

impl ConversationCounters {
    /// Add `count` unread messages to the bucket matching `kind`.
    pub fn add_unread(&mut self, kind: ConversationKind, count: i64) {
        match kind {
            ConversationKind::Direct => self.direct_unread += count,
            ConversationKind::Group => self.group_unread += count,
            ConversationKind::Channel => self.channel_unread += count,
            ConversationKind::Other => {}
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub fn has_negative(&self) -> bool {
        self.direct_unread < 0
            || self.group_unread < 0
            || self.channel_unread < 0
            || self.mention_unread < 0
            || self.reply_unread < 0
    }
}

impl fmt::Display for ConversationCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:4} direct, {:4} mentions, {:4} group, {:4} channel, {:4} replies",
            self.direct_unread,
            self.mention_unread,
            self.group_unread,
            self.channel_unread,
            self.reply_unread
        )
    }
}
