//! Reaction vote synchronization across every mirror of a relayed message.
//!
//! An inbound reaction is turned into a vote toggle ([`engine`]), the message's
//! button layout is rebuilt once, and the result is pushed to all other
//! mirrors concurrently ([`fanout`]). [`relay::ReactionRelay`] ties the two
//! together behind a single entry point that never returns an error.

pub mod engine;
pub mod error;
pub mod fanout;
pub mod locks;
pub mod relay;
pub mod retry;
pub mod store;

#[cfg(test)]
mod testing;

pub use engine::{ReactionSync, ToggleEvent, rebuild_layout};
pub use error::{DispatchError, StoreError, StoreResult, SyncError};
pub use fanout::{DispatchOutcome, FanoutCoordinator, MirrorOutbound};
pub use relay::{ReactionRelay, RelayReport, RelaySettings};
pub use retry::RetryPolicy;
pub use store::{RecordStore, SqliteStore};
