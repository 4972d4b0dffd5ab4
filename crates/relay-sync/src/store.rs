use std::sync::Arc;

use async_trait::async_trait;

use relay_db::Database;
use relay_types::models::{BroadcastDestination, MessageMirror, MessageRef, ReactionToggle};

use crate::error::StoreResult;

/// Record storage consumed by the sync engine and the fan-out coordinator.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All destinations currently joined to a network type.
    async fn list_destinations(&self, network_type: &str) -> StoreResult<Vec<BroadcastDestination>>;

    async fn find_destination(&self, channel_id: &str) -> StoreResult<Option<BroadcastDestination>>;

    /// All mirrors of a logical message.
    async fn list_mirrors(&self, message: &MessageRef) -> StoreResult<Vec<MessageMirror>>;

    async fn find_mirror(&self, channel_id: &str, message_id: &str) -> StoreResult<Option<MessageMirror>>;

    async fn has_toggle(&self, toggle: &ReactionToggle) -> StoreResult<bool>;

    /// Atomically flip the existence of a vote. Returns true if the vote is
    /// active afterwards.
    async fn flip_toggle(&self, toggle: &ReactionToggle) -> StoreResult<bool>;

    /// Author of a relayed message, for moderation lookups.
    async fn resolve_origin_user(&self, message: &MessageRef) -> StoreResult<Option<String>>;
}

/// [`RecordStore`] over the SQLite database. Every call runs on the blocking
/// pool so the async runtime never waits on SQLite.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    async fn blocking<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let result = tokio::task::spawn_blocking(move || f(&db)).await?;
        Ok(result?)
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn list_destinations(&self, network_type: &str) -> StoreResult<Vec<BroadcastDestination>> {
        let network_type = network_type.to_string();
        self.blocking(move |db| db.list_destinations(&network_type)).await
    }

    async fn find_destination(&self, channel_id: &str) -> StoreResult<Option<BroadcastDestination>> {
        let channel_id = channel_id.to_string();
        self.blocking(move |db| db.find_destination(&channel_id)).await
    }

    async fn list_mirrors(&self, message: &MessageRef) -> StoreResult<Vec<MessageMirror>> {
        let message = message.clone();
        self.blocking(move |db| db.list_mirrors(&message.channel_id, &message.message_id))
            .await
    }

    async fn find_mirror(&self, channel_id: &str, message_id: &str) -> StoreResult<Option<MessageMirror>> {
        let channel_id = channel_id.to_string();
        let message_id = message_id.to_string();
        self.blocking(move |db| db.find_mirror(&channel_id, &message_id)).await
    }

    async fn has_toggle(&self, toggle: &ReactionToggle) -> StoreResult<bool> {
        let toggle = toggle.clone();
        self.blocking(move |db| db.has_toggle(&toggle)).await
    }

    async fn flip_toggle(&self, toggle: &ReactionToggle) -> StoreResult<bool> {
        let toggle = toggle.clone();
        self.blocking(move |db| db.flip_toggle(&toggle)).await
    }

    async fn resolve_origin_user(&self, message: &MessageRef) -> StoreResult<Option<String>> {
        let message = message.clone();
        self.blocking(move |db| db.resolve_origin_user(&message.channel_id, &message.message_id))
            .await
    }
}
