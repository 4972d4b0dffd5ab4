use crate::models::{BroadcastRow, MessageRow};
use crate::Database;
use anyhow::Result;
use chrono::{DateTime, Utc};
use relay_types::models::{BroadcastDestination, MessageMirror, ReactionToggle};
use rusqlite::{Connection, Row};
use tracing::warn;

const BROADCAST_COLUMNS: &str = "channel_id, network_type, guild_id, webhook_id, webhook_token, \
     important_role_id, auto_ban_level";

const MESSAGE_COLUMNS: &str = "origin_channel_id, origin_message_id, channel_id, channel_message_id, \
     guild_id, timestamp, user_id, user_name, message_origin";

impl Database {
    // -- Broadcast destinations --

    /// Insert a destination, replacing the webhook credential if the channel
    /// was already registered.
    pub fn save_destination(&self, dest: &BroadcastDestination) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO broadcasts
                    (channel_id, network_type, guild_id, webhook_id, webhook_token, important_role_id, auto_ban_level)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(channel_id) DO UPDATE SET
                    network_type = excluded.network_type,
                    guild_id = excluded.guild_id,
                    webhook_id = excluded.webhook_id,
                    webhook_token = excluded.webhook_token",
                rusqlite::params![
                    dest.channel_id,
                    dest.network_type,
                    dest.guild_id,
                    dest.webhook_id,
                    dest.webhook_token,
                    dest.important_role_id,
                    dest.auto_ban_level,
                ],
            )?;
            Ok(())
        })
    }

    /// Admin-editable settings. Returns false when the channel is not registered.
    pub fn update_destination_settings(
        &self,
        channel_id: &str,
        important_role_id: Option<&str>,
        auto_ban_level: i64,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE broadcasts SET important_role_id = ?2, auto_ban_level = ?3 WHERE channel_id = ?1",
                rusqlite::params![channel_id, important_role_id, auto_ban_level],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_destination(&self, channel_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM broadcasts WHERE channel_id = ?1", [channel_id])?;
            Ok(changed > 0)
        })
    }

    pub fn find_destination(&self, channel_id: &str) -> Result<Option<BroadcastDestination>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM broadcasts WHERE channel_id = ?1", BROADCAST_COLUMNS);
            let row = conn
                .query_row(&sql, [channel_id], broadcast_from_row)
                .optional()?;
            Ok(row.map(BroadcastDestination::from))
        })
    }

    pub fn list_destinations(&self, network_type: &str) -> Result<Vec<BroadcastDestination>> {
        self.with_conn(|conn| query_destinations(conn, network_type))
    }

    // -- Message mirrors --

    pub fn save_mirror(&self, mirror: &MessageMirror) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO messages
                    (origin_channel_id, origin_message_id, channel_id, channel_message_id,
                     guild_id, timestamp, user_id, user_name, message_origin)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    mirror.origin_channel_id,
                    mirror.origin_message_id,
                    mirror.channel_id,
                    mirror.mirror_message_id,
                    mirror.guild_id,
                    mirror.timestamp.timestamp_millis(),
                    mirror.author_id,
                    mirror.author_name,
                    mirror.origin_kind,
                ],
            )?;
            Ok(())
        })
    }

    /// The mirror posted as `message_id` in `channel_id`, if any.
    pub fn find_mirror(&self, channel_id: &str, message_id: &str) -> Result<Option<MessageMirror>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages WHERE channel_id = ?1 AND channel_message_id = ?2",
                MESSAGE_COLUMNS
            );
            let row = conn
                .query_row(&sql, [channel_id, message_id], message_from_row)
                .optional()?;
            Ok(row.map(MessageMirror::from))
        })
    }

    pub fn list_mirrors(&self, origin_channel_id: &str, origin_message_id: &str) -> Result<Vec<MessageMirror>> {
        self.with_conn(|conn| query_mirrors(conn, origin_channel_id, origin_message_id))
    }

    /// Author of a relayed message, looked up from either a mirror id or the
    /// origin id.
    pub fn resolve_origin_user(&self, channel_id: &str, message_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let user_id = conn
                .query_row(
                    "SELECT user_id FROM messages
                     WHERE (channel_id = ?1 AND channel_message_id = ?2)
                        OR (origin_channel_id = ?1 AND origin_message_id = ?2)
                     LIMIT 1",
                    [channel_id, message_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(user_id)
        })
    }

    // -- Reaction toggles --

    pub fn has_toggle(&self, toggle: &ReactionToggle) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM user_reactions WHERE message_id = ?1 AND user_id = ?2 AND reaction_key = ?3",
                    rusqlite::params![toggle.message_id, toggle.user_id, toggle.reaction_key],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Toggle a vote: removes it if present, inserts it if not, inside one
    /// transaction. Returns true when the vote is active afterwards.
    pub fn flip_toggle(&self, toggle: &ReactionToggle) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let removed = tx.execute(
                "DELETE FROM user_reactions WHERE message_id = ?1 AND user_id = ?2 AND reaction_key = ?3",
                rusqlite::params![toggle.message_id, toggle.user_id, toggle.reaction_key],
            )?;

            let active = if removed > 0 {
                false
            } else {
                tx.execute(
                    "INSERT INTO user_reactions (id, message_id, user_id, reaction_key) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![
                        uuid::Uuid::new_v4().to_string(),
                        toggle.message_id,
                        toggle.user_id,
                        toggle.reaction_key,
                    ],
                )?;
                true
            };

            tx.commit()?;
            Ok(active)
        })
    }
}

fn query_destinations(conn: &Connection, network_type: &str) -> Result<Vec<BroadcastDestination>> {
    let sql = format!(
        "SELECT {} FROM broadcasts WHERE network_type = ?1 ORDER BY created_at, channel_id",
        BROADCAST_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map([network_type], broadcast_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows.into_iter().map(BroadcastDestination::from).collect())
}

fn query_mirrors(conn: &Connection, origin_channel_id: &str, origin_message_id: &str) -> Result<Vec<MessageMirror>> {
    let sql = format!(
        "SELECT {} FROM messages WHERE origin_channel_id = ?1 AND origin_message_id = ?2",
        MESSAGE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map([origin_channel_id, origin_message_id], message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows.into_iter().map(MessageMirror::from).collect())
}

fn broadcast_from_row(row: &Row<'_>) -> rusqlite::Result<BroadcastRow> {
    Ok(BroadcastRow {
        channel_id: row.get(0)?,
        network_type: row.get(1)?,
        guild_id: row.get(2)?,
        webhook_id: row.get(3)?,
        webhook_token: row.get(4)?,
        important_role_id: row.get(5)?,
        auto_ban_level: row.get(6)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        origin_channel_id: row.get(0)?,
        origin_message_id: row.get(1)?,
        channel_id: row.get(2)?,
        channel_message_id: row.get(3)?,
        guild_id: row.get(4)?,
        timestamp: row.get(5)?,
        user_id: row.get(6)?,
        user_name: row.get(7)?,
        message_origin: row.get(8)?,
    })
}

impl From<BroadcastRow> for BroadcastDestination {
    fn from(row: BroadcastRow) -> Self {
        Self {
            channel_id: row.channel_id,
            network_type: row.network_type,
            guild_id: row.guild_id,
            webhook_id: row.webhook_id,
            webhook_token: row.webhook_token,
            important_role_id: row.important_role_id,
            auto_ban_level: row.auto_ban_level,
        }
    }
}

impl From<MessageRow> for MessageMirror {
    fn from(row: MessageRow) -> Self {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(row.timestamp).unwrap_or_else(|| {
            warn!(
                "Corrupt timestamp {} on message '{}' in channel '{}'",
                row.timestamp, row.channel_message_id, row.channel_id
            );
            DateTime::default()
        });

        Self {
            origin_channel_id: row.origin_channel_id,
            origin_message_id: row.origin_message_id,
            channel_id: row.channel_id,
            mirror_message_id: row.channel_message_id,
            guild_id: row.guild_id,
            timestamp,
            author_id: row.user_id,
            author_name: row.user_name,
            origin_kind: u8::try_from(row.message_origin).unwrap_or_default(),
        }
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
