use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS broadcasts (
            channel_id          TEXT PRIMARY KEY,
            network_type        TEXT NOT NULL,
            guild_id            TEXT NOT NULL,
            webhook_id          TEXT NOT NULL,
            webhook_token       TEXT NOT NULL,
            important_role_id   TEXT,
            auto_ban_level      INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_broadcasts_network
            ON broadcasts(network_type);

        CREATE TABLE IF NOT EXISTS messages (
            origin_channel_id   TEXT NOT NULL,
            origin_message_id   TEXT NOT NULL,
            channel_id          TEXT NOT NULL,
            channel_message_id  TEXT NOT NULL,
            guild_id            TEXT NOT NULL,
            timestamp           INTEGER NOT NULL,
            user_id             TEXT NOT NULL,
            user_name           TEXT NOT NULL,
            message_origin      INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (channel_id, channel_message_id)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_origin
            ON messages(origin_channel_id, origin_message_id);

        CREATE TABLE IF NOT EXISTS user_reactions (
            id              TEXT PRIMARY KEY,
            message_id      TEXT NOT NULL,
            user_id         TEXT NOT NULL,
            reaction_key    TEXT NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(message_id, user_id, reaction_key)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
