use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use relay_types::events::{IgnoreReason, ReactionEvent};
use relay_types::layout::ButtonLayout;
use relay_types::models::{BroadcastDestination, MessageRef};

use crate::engine::{ReactionSync, ToggleEvent};
use crate::error::StoreResult;
use crate::fanout::{DispatchOutcome, FanoutCoordinator, MirrorOutbound};
use crate::retry::RetryPolicy;
use crate::store::RecordStore;

#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Network types that never take part in reaction sync.
    pub non_chat_networks: Vec<String>,
    pub dispatch_timeout: Duration,
    pub toggle_retry: RetryPolicy,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            non_chat_networks: Vec::new(),
            dispatch_timeout: Duration::from_secs(5),
            toggle_retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug)]
pub enum RelayReport {
    /// The event was not a vote on a relayed chat message.
    Ignored(IgnoreReason),
    /// No safe layout could be computed. Nothing was sent.
    Failed(String),
    Applied {
        layout: ButtonLayout,
        outcomes: Vec<DispatchOutcome>,
    },
}

/// Entry point for reaction events coming from the host.
pub struct ReactionRelay {
    store: Arc<dyn RecordStore>,
    sync: ReactionSync,
    fanout: FanoutCoordinator,
    non_chat_networks: HashSet<String>,
}

impl ReactionRelay {
    pub fn new(store: Arc<dyn RecordStore>, outbound: Arc<dyn MirrorOutbound>, settings: RelaySettings) -> Self {
        Self {
            sync: ReactionSync::new(store.clone(), settings.toggle_retry),
            fanout: FanoutCoordinator::new(store.clone(), outbound, settings.dispatch_timeout),
            non_chat_networks: settings.non_chat_networks.into_iter().collect(),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Toggle the actor's vote, rebuild the layout once and push it to every
    /// other mirror. Failures are logged and reported, never returned as errors.
    pub async fn handle_reaction_event(&self, event: ReactionEvent) -> RelayReport {
        if event.actor_is_bot {
            return RelayReport::Ignored(IgnoreReason::BotActor);
        }

        let destination = match self.store.find_destination(&event.channel_id).await {
            Ok(Some(destination)) => destination,
            Ok(None) => return RelayReport::Ignored(IgnoreReason::ChannelNotRelayed),
            Err(e) => {
                error!("Could not look up destination {}: {}", event.channel_id, e);
                return RelayReport::Failed(e.to_string());
            }
        };

        if self.non_chat_networks.contains(&destination.network_type) {
            return RelayReport::Ignored(IgnoreReason::NonChatNetwork);
        }

        let message = match self.resolve_logical_message(&event).await {
            Ok(Some(message)) => message,
            Ok(None) => return RelayReport::Ignored(IgnoreReason::UnknownMessage),
            Err(e) => {
                error!(
                    "Could not resolve message {} in channel {}: {}",
                    event.message_id, event.channel_id, e
                );
                return RelayReport::Failed(e.to_string());
            }
        };

        self.apply(event, destination, message).await
    }

    async fn apply(&self, event: ReactionEvent, destination: BroadcastDestination, message: MessageRef) -> RelayReport {
        let parsed = ButtonLayout::parse_lenient(&event.current_layout);
        for skipped in &parsed.skipped {
            warn!("Message {} in channel {}: {}", event.message_id, event.channel_id, skipped);
        }

        let toggle = ToggleEvent {
            acting_user_id: event.acting_user_id,
            reaction_key: event.reaction_key,
            message_id: message.message_id.clone(),
        };

        let layout = match self.sync.apply_reaction_toggle(&parsed.layout, &toggle).await {
            Ok(layout) => layout,
            Err(e) => {
                error!(
                    "Could not apply {} by {} on message {}: {}",
                    toggle.reaction_key, toggle.acting_user_id, message.message_id, e
                );
                return RelayReport::Failed(e.to_string());
            }
        };

        let outcomes = self
            .fanout
            .propagate(&message, &destination.network_type, &layout, &event.message_id)
            .await;

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(
            "Reaction {} on message {} synced to {} mirror(s) in '{}' ({} failed)",
            toggle.reaction_key,
            message.message_id,
            outcomes.len() - failed,
            destination.network_type,
            failed
        );

        RelayReport::Applied { layout, outcomes }
    }

    /// The logical message behind the reacted message: the origin of a mirror,
    /// or the message itself when it is an origin.
    async fn resolve_logical_message(&self, event: &ReactionEvent) -> StoreResult<Option<MessageRef>> {
        if let Some(mirror) = self.store.find_mirror(&event.channel_id, &event.message_id).await? {
            return Ok(Some(mirror.logical_message()));
        }

        let candidate = MessageRef {
            channel_id: event.channel_id.clone(),
            message_id: event.message_id.clone(),
        };
        let mirrors = self.store.list_mirrors(&candidate).await?;
        Ok((!mirrors.is_empty()).then_some(candidate))
    }
}
