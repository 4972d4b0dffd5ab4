use std::time::Duration;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failure talking to the record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        Self::Unavailable(format!("{:#}", err))
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Unavailable(format!("store task failed: {}", err))
    }
}

/// No safe layout update could be produced.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("could not {op} after {attempts} attempt(s): {source}")]
    Store {
        op: &'static str,
        attempts: u32,
        #[source]
        source: StoreError,
    },
}

/// Per-destination fan-out failure. Recorded, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("destination unreachable: {0}")]
    DestinationUnreachable(String),

    #[error("no answer within {0:?}")]
    TimedOut(Duration),
}
