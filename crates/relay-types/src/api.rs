use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::layout::RawRow;

// -- Destinations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterDestinationRequest {
    pub channel_id: String,
    pub network_type: String,
    pub guild_id: String,
    pub webhook_id: String,
    pub webhook_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateDestinationRequest {
    pub important_role_id: Option<String>,
    pub auto_ban_level: i64,
}

// -- Mirrors --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordMirrorRequest {
    pub origin_channel_id: String,
    pub origin_message_id: String,
    pub channel_id: String,
    pub mirror_message_id: String,
    pub guild_id: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub author_id: String,
    pub author_name: String,
    #[serde(default)]
    pub origin_kind: u8,
}

#[derive(Debug, Serialize)]
pub struct OriginUserResponse {
    pub user_id: String,
}

// -- Reactions --

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionStatus {
    Applied,
    Ignored,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct ReactionEventResponse {
    pub status: ReactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Layout to show on the reacted message itself.
    pub components: Vec<RawRow>,
    pub delivered: usize,
    pub failed: usize,
}
