use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{debug, warn};

use relay_types::layout::ButtonLayout;
use relay_types::models::{BroadcastDestination, MessageMirror, MessageRef};

use crate::error::DispatchError;
use crate::store::RecordStore;

/// Outbound side of a destination: edits a mirror through the destination's
/// proxy identity.
#[async_trait]
pub trait MirrorOutbound: Send + Sync {
    /// Replace the button rows of an already posted mirror.
    async fn replace_layout(
        &self,
        destination: &BroadcastDestination,
        mirror_message_id: &str,
        layout: &ButtonLayout,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub channel_id: String,
    pub mirror_message_id: String,
    pub result: Result<(), DispatchError>,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Pushes a rebuilt layout to every mirror of a logical message.
///
/// Best effort: dispatches run concurrently, each under its own timeout, and a
/// failing destination is recorded without affecting the others.
pub struct FanoutCoordinator {
    store: Arc<dyn RecordStore>,
    outbound: Arc<dyn MirrorOutbound>,
    timeout: Duration,
}

impl FanoutCoordinator {
    pub fn new(store: Arc<dyn RecordStore>, outbound: Arc<dyn MirrorOutbound>, timeout: Duration) -> Self {
        Self {
            store,
            outbound,
            timeout,
        }
    }

    /// Send `layout` to the mirror of `message` in every destination of
    /// `network_type`, except the mirror the event originated on.
    /// Destinations without a mirror of this message are skipped.
    pub async fn propagate(
        &self,
        message: &MessageRef,
        network_type: &str,
        layout: &ButtonLayout,
        origin_mirror_id: &str,
    ) -> Vec<DispatchOutcome> {
        let destinations = match self.store.list_destinations(network_type).await {
            Ok(destinations) => destinations,
            Err(e) => {
                warn!("No destinations for network '{}': {}", network_type, e);
                return Vec::new();
            }
        };

        let mirrors = match self.store.list_mirrors(message).await {
            Ok(mirrors) => mirrors,
            Err(e) => {
                warn!(
                    "No mirrors for message {} in channel {}: {}",
                    message.message_id, message.channel_id, e
                );
                return Vec::new();
            }
        };

        let by_channel: HashMap<&str, &MessageMirror> = mirrors
            .iter()
            .map(|mirror| (mirror.channel_id.as_str(), mirror))
            .collect();

        let dispatches = destinations.iter().filter_map(|destination| {
            let mirror = by_channel.get(destination.channel_id.as_str())?;
            if mirror.mirror_message_id == origin_mirror_id {
                return None;
            }
            Some(self.dispatch(destination, &mirror.mirror_message_id, layout))
        });

        join_all(dispatches).await
    }

    async fn dispatch(
        &self,
        destination: &BroadcastDestination,
        mirror_message_id: &str,
        layout: &ButtonLayout,
    ) -> DispatchOutcome {
        let edit = self.outbound.replace_layout(destination, mirror_message_id, layout);

        let result = match tokio::time::timeout(self.timeout, edit).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DispatchError::DestinationUnreachable(format!("{:#}", e))),
            Err(_) => Err(DispatchError::TimedOut(self.timeout)),
        };

        match &result {
            Ok(()) => debug!(
                "Updated mirror {} in channel {}",
                mirror_message_id, destination.channel_id
            ),
            Err(e) => warn!(
                "Could not update mirror {} in channel {} (guild {}): {}",
                mirror_message_id, destination.channel_id, destination.guild_id, e
            ),
        }

        DispatchOutcome {
            channel_id: destination.channel_id.clone(),
            mirror_message_id: mirror_message_id.to_string(),
            result,
        }
    }
}
