//! Database row types. These map directly to SQLite rows and are converted
//! into relay-types models at the query boundary.

pub struct BroadcastRow {
    pub channel_id: String,
    pub network_type: String,
    pub guild_id: String,
    pub webhook_id: String,
    pub webhook_token: String,
    pub important_role_id: Option<String>,
    pub auto_ban_level: i64,
}

pub struct MessageRow {
    pub origin_channel_id: String,
    pub origin_message_id: String,
    pub channel_id: String,
    pub channel_message_id: String,
    pub guild_id: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub user_id: String,
    pub user_name: String,
    pub message_origin: i64,
}
