use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A channel that has joined a network and receives mirrors through its
/// outbound webhook identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastDestination {
    pub channel_id: String,
    pub network_type: String,
    pub guild_id: String,
    pub webhook_id: String,
    /// Secret half of the webhook credential. Never serialized back out.
    #[serde(skip_serializing)]
    pub webhook_token: String,
    pub important_role_id: Option<String>,
    pub auto_ban_level: i64,
}

/// One posted copy of a logical message inside a destination channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMirror {
    pub origin_channel_id: String,
    pub origin_message_id: String,
    pub channel_id: String,
    pub mirror_message_id: String,
    pub guild_id: String,
    pub timestamp: DateTime<Utc>,
    pub author_id: String,
    pub author_name: String,
    /// Host-defined tag for where the message came from (chat, sticker, system...).
    pub origin_kind: u8,
}

impl MessageMirror {
    pub fn logical_message(&self) -> MessageRef {
        MessageRef {
            channel_id: self.origin_channel_id.clone(),
            message_id: self.origin_message_id.clone(),
        }
    }
}

/// Identifies a message by the channel it lives in and its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_id: String,
}

/// Key of one user's vote with one reaction on one logical message.
///
/// `message_id` is the origin message id of the logical message, so a vote
/// cast on any mirror lands on the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReactionToggle {
    pub message_id: String,
    pub user_id: String,
    pub reaction_key: String,
}
