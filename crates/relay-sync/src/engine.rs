use std::sync::Arc;

use tracing::{debug, warn};

use relay_types::layout::{Assembled, ButtonLayout, VoteButton};
use relay_types::models::ReactionToggle;

use crate::error::SyncError;
use crate::locks::KeyedLocks;
use crate::retry::{RetryPolicy, with_retry};
use crate::store::RecordStore;

/// One physical reaction by one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleEvent {
    pub acting_user_id: String,
    pub reaction_key: String,
    /// Origin message id of the logical message.
    pub message_id: String,
}

impl ToggleEvent {
    pub fn toggle_key(&self) -> ReactionToggle {
        ReactionToggle {
            message_id: self.message_id.clone(),
            user_id: self.acting_user_id.clone(),
            reaction_key: self.reaction_key.clone(),
        }
    }
}

/// Recompute the vote buttons for one toggle.
///
/// The matching button moves by one in the direction given by `had_voted` and
/// disappears at zero. A reaction nobody had used yet gets a fresh button with
/// a count of one. Everything is reflowed behind the untouched pinned row.
pub fn rebuild_layout(current: &ButtonLayout, reaction_key: &str, had_voted: bool) -> Assembled {
    let mut matched = false;
    let mut buttons = Vec::new();

    for button in current.vote_buttons() {
        if button.key != reaction_key {
            buttons.push(button.clone());
            continue;
        }

        matched = true;
        let count = if had_voted {
            button.count.saturating_sub(1)
        } else {
            button.count.saturating_add(1)
        };
        if count > 0 {
            buttons.push(VoteButton { count, ..button.clone() });
        }
    }

    if !matched && !had_voted {
        buttons.push(VoteButton::first_vote(reaction_key));
    }

    ButtonLayout::assemble(current.pinned().cloned(), buttons)
}

/// Toggles votes and produces the layout that reflects them.
///
/// Events on the same logical message are serialized: the read of the vote
/// state, the rebuild and the write happen under one lock. While events for a
/// message overlap, each one builds on the layout its predecessor produced
/// instead of the (possibly stale) layout it arrived with.
pub struct ReactionSync {
    store: Arc<dyn RecordStore>,
    locks: KeyedLocks<String, Option<ButtonLayout>>,
    retry: RetryPolicy,
}

impl ReactionSync {
    pub fn new(store: Arc<dyn RecordStore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            retry,
        }
    }

    /// Apply one toggle. Must be called exactly once per physical event, as
    /// the stored vote is flipped every time.
    pub async fn apply_reaction_toggle(
        &self,
        current: &ButtonLayout,
        event: &ToggleEvent,
    ) -> Result<ButtonLayout, SyncError> {
        let key = event.toggle_key();
        let mut latest = self.locks.lock(event.message_id.clone()).await;

        let had_voted = with_retry(self.retry, "read vote state", || self.store.has_toggle(&key)).await?;

        let base = latest.as_ref().unwrap_or(current);
        let Assembled { layout, dropped } = rebuild_layout(base, &event.reaction_key, had_voted);
        if dropped > 0 {
            warn!(
                "Layout for message {} is full, dropped {} vote button(s)",
                event.message_id, dropped
            );
        }

        self.persist_toggle(&key, had_voted).await?;

        debug!(
            "{} {} {} on message {}",
            event.acting_user_id,
            if had_voted { "retracted" } else { "added" },
            event.reaction_key,
            event.message_id
        );

        *latest = Some(layout.clone());
        Ok(layout)
    }

    async fn persist_toggle(&self, key: &ReactionToggle, had_voted: bool) -> Result<(), SyncError> {
        let attempts = self.retry.max_attempts();
        let mut attempt = 1;

        loop {
            match self.store.flip_toggle(key).await {
                Ok(_) => return Ok(()),
                Err(e) if attempt < attempts => {
                    warn!("persist vote failed (attempt {}/{}): {}", attempt, attempts, e);
                    tokio::time::sleep(self.retry.backoff).await;
                    attempt += 1;

                    // A failed attempt may still have been committed.
                    if let Ok(now) = self.store.has_toggle(key).await {
                        if now != had_voted {
                            return Ok(());
                        }
                    }
                }
                Err(source) => {
                    return Err(SyncError::Store {
                        op: "persist vote",
                        attempts,
                        source,
                    });
                }
            }
        }
    }
}
