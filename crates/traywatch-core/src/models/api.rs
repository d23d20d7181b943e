//! Records returned by the bulk REST API, named for what they mean here
//! and renamed onto the server's JSON field names.

use serde::{Deserialize, Serialize};

use super::ConversationKind;

/// The watching user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

/// A channel as listed for a team and user, with server-side totals.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    #[serde(rename = "total_msg_count", default)]
    pub total_messages: i64,
    /// Messages that are thread roots (not replies)
    #[serde(rename = "total_msg_count_root", default)]
    pub total_root_messages: i64,
}

/// The user's membership record for one channel: how far they have read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    #[serde(rename = "channel_id")]
    pub conversation_id: String,
    #[serde(rename = "msg_count", default)]
    pub seen_messages: i64,
    #[serde(rename = "msg_count_root", default)]
    pub seen_root_messages: i64,
    #[serde(default)]
    pub mention_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_from_server_json() {
        let json = r#"{
            "id": "chan1",
            "type": "P",
            "display_name": "Town Square",
            "total_msg_count": 42,
            "total_msg_count_root": 30,
            "last_post_at": 1700000000000
        }"#;
        let conversation: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conversation.id, "chan1");
        assert_eq!(conversation.kind, ConversationKind::Channel);
        assert_eq!(conversation.total_messages, 42);
        assert_eq!(conversation.total_root_messages, 30);
    }

    #[test]
    fn test_membership_from_server_json() {
        let json = r#"{
            "channel_id": "chan1",
            "user_id": "me",
            "msg_count": 40,
            "msg_count_root": 29,
            "mention_count": 3,
            "mention_count_root": 2
        }"#;
        let membership: Membership = serde_json::from_str(json).unwrap();
        assert_eq!(membership.conversation_id, "chan1");
        assert_eq!(membership.seen_messages, 40);
        assert_eq!(membership.seen_root_messages, 29);
        assert_eq!(membership.mention_count, 3);
    }

    #[test]
    fn test_unknown_channel_type_is_other() {
        let json = r#"{"id": "x", "type": "Z"}"#;
        let conversation: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conversation.kind, ConversationKind::Other);
        assert_eq!(conversation.total_messages, 0);
    }
}
