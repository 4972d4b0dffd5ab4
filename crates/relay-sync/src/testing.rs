//! Shared fixtures for the unit tests in this crate.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::DateTime;

use relay_db::Database;
use relay_types::layout::{ButtonLayout, ButtonStyle, RawButton, RawRow, REPLY_MARKER};
use relay_types::models::{BroadcastDestination, MessageMirror, MessageRef, ReactionToggle};

use crate::error::{StoreError, StoreResult};
use crate::fanout::MirrorOutbound;
use crate::store::{RecordStore, SqliteStore};

pub fn memory_store() -> (Arc<dyn RecordStore>, Arc<Database>) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    (Arc::new(SqliteStore::new(db.clone())), db)
}

pub fn destination(channel_id: &str, network_type: &str) -> BroadcastDestination {
    BroadcastDestination {
        channel_id: channel_id.into(),
        network_type: network_type.into(),
        guild_id: format!("g-{}", channel_id),
        webhook_id: format!("hook-{}", channel_id),
        webhook_token: "token".into(),
        important_role_id: None,
        auto_ban_level: 0,
    }
}

/// Destinations `c1..=cN` on `network_type`, each holding mirror `mI` of the
/// logical message (`c1`, `m1`).
pub fn seed_network(db: &Database, network_type: &str, size: usize) {
    for i in 1..=size {
        let channel_id = format!("c{}", i);
        db.save_destination(&destination(&channel_id, network_type)).unwrap();
        db.save_mirror(&MessageMirror {
            origin_channel_id: "c1".into(),
            origin_message_id: "m1".into(),
            channel_id: channel_id.clone(),
            mirror_message_id: format!("m{}", i),
            guild_id: format!("g-{}", channel_id),
            timestamp: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
            author_id: "author".into(),
            author_name: "Author".into(),
            origin_kind: 0,
        })
        .unwrap();
    }
}

pub fn reply_row() -> RawRow {
    RawRow {
        components: vec![
            RawButton {
                custom_id: Some(REPLY_MARKER.into()),
                emoji: Some("↩".into()),
                label: Some("Reply".into()),
                style: ButtonStyle::Primary,
                ..Default::default()
            },
            RawButton {
                label: Some("Jump to original".into()),
                style: ButtonStyle::Link,
                url: Some("https://example.com/c0/m0".into()),
                ..Default::default()
            },
        ],
    }
}

pub fn votes(buttons: &[(&str, &str)]) -> RawRow {
    RawRow {
        components: buttons
            .iter()
            .map(|(key, label)| RawButton {
                custom_id: Some(key.to_string()),
                emoji: Some(key.to_string()),
                label: Some(label.to_string()),
                ..Default::default()
            })
            .collect(),
    }
}

/// Outbound that records every edit. Channels can be set to fail or to never answer.
#[derive(Default)]
pub struct RecordingOutbound {
    failing: HashSet<String>,
    hanging: HashSet<String>,
    edits: Mutex<Vec<(String, String, ButtonLayout)>>,
}

impl RecordingOutbound {
    pub fn failing(mut self, channel_id: &str) -> Self {
        self.failing.insert(channel_id.to_string());
        self
    }

    pub fn hanging(mut self, channel_id: &str) -> Self {
        self.hanging.insert(channel_id.to_string());
        self
    }

    /// (channel, mirror) pairs in call order.
    pub fn edited(&self) -> Vec<(String, String)> {
        self.edits
            .lock()
            .unwrap()
            .iter()
            .map(|(channel, mirror, _)| (channel.clone(), mirror.clone()))
            .collect()
    }

    pub fn layouts(&self) -> Vec<ButtonLayout> {
        self.edits.lock().unwrap().iter().map(|(_, _, layout)| layout.clone()).collect()
    }
}

#[async_trait]
impl MirrorOutbound for RecordingOutbound {
    async fn replace_layout(
        &self,
        destination: &BroadcastDestination,
        mirror_message_id: &str,
        layout: &ButtonLayout,
    ) -> anyhow::Result<()> {
        if self.hanging.contains(&destination.channel_id) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&destination.channel_id) {
            anyhow::bail!("webhook for {} was deleted", destination.channel_id);
        }
        self.edits.lock().unwrap().push((
            destination.channel_id.clone(),
            mirror_message_id.to_string(),
            layout.clone(),
        ));
        Ok(())
    }
}

/// Store wrapper that injects failures in front of a real store.
pub struct FlakyStore {
    inner: Arc<dyn RecordStore>,
    failing_flips: u32,
    commit_before_failing: bool,
    failing_reads: bool,
    flips: AtomicU32,
}

impl FlakyStore {
    /// The first `count` flips fail without touching the inner store.
    pub fn failing_flips(inner: Arc<dyn RecordStore>, count: u32) -> Self {
        Self::new(inner, count, false, false)
    }

    /// The first `count` flips reach the inner store but report failure.
    pub fn lost_acknowledgements(inner: Arc<dyn RecordStore>, count: u32) -> Self {
        Self::new(inner, count, true, false)
    }

    /// Destination and mirror listings always fail.
    pub fn failing_reads(inner: Arc<dyn RecordStore>) -> Self {
        Self::new(inner, 0, false, true)
    }

    fn new(inner: Arc<dyn RecordStore>, failing_flips: u32, commit_before_failing: bool, failing_reads: bool) -> Self {
        Self {
            inner,
            failing_flips,
            commit_before_failing,
            failing_reads,
            flips: AtomicU32::new(0),
        }
    }

    pub fn flip_calls(&self) -> u32 {
        self.flips.load(Ordering::SeqCst)
    }

    fn read_guard(&self) -> StoreResult<()> {
        if self.failing_reads {
            Err(StoreError::Unavailable("disk I/O error".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn list_destinations(&self, network_type: &str) -> StoreResult<Vec<BroadcastDestination>> {
        self.read_guard()?;
        self.inner.list_destinations(network_type).await
    }

    async fn find_destination(&self, channel_id: &str) -> StoreResult<Option<BroadcastDestination>> {
        self.inner.find_destination(channel_id).await
    }

    async fn list_mirrors(&self, message: &MessageRef) -> StoreResult<Vec<MessageMirror>> {
        self.read_guard()?;
        self.inner.list_mirrors(message).await
    }

    async fn find_mirror(&self, channel_id: &str, message_id: &str) -> StoreResult<Option<MessageMirror>> {
        self.inner.find_mirror(channel_id, message_id).await
    }

    async fn has_toggle(&self, toggle: &ReactionToggle) -> StoreResult<bool> {
        self.inner.has_toggle(toggle).await
    }

    async fn flip_toggle(&self, toggle: &ReactionToggle) -> StoreResult<bool> {
        let call = self.flips.fetch_add(1, Ordering::SeqCst);
        if call < self.failing_flips {
            if self.commit_before_failing {
                self.inner.flip_toggle(toggle).await?;
            }
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        self.inner.flip_toggle(toggle).await
    }

    async fn resolve_origin_user(&self, message: &MessageRef) -> StoreResult<Option<String>> {
        self.inner.resolve_origin_user(message).await
    }
}
