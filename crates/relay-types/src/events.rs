use serde::{Deserialize, Serialize};

use crate::layout::RawRow;

/// A reaction a user placed on a relayed message, as delivered by the
/// event-ingestion host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionEvent {
    /// Channel the reaction happened in.
    pub channel_id: String,
    /// Message that was reacted on: a mirror, or the origin itself.
    pub message_id: String,
    pub acting_user_id: String,
    #[serde(default)]
    pub actor_is_bot: bool,
    /// Emoji identifier of the reaction.
    pub reaction_key: String,
    /// Button rows currently shown on the reacted message.
    #[serde(default)]
    pub current_layout: Vec<RawRow>,
}

/// Why an inbound event produced no vote change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    BotActor,
    ChannelNotRelayed,
    NonChatNetwork,
    UnknownMessage,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BotActor => "bot_actor",
            Self::ChannelNotRelayed => "channel_not_relayed",
            Self::NonChatNetwork => "non_chat_network",
            Self::UnknownMessage => "unknown_message",
        }
    }
}
