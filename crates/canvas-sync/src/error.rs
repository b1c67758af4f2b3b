//! Sync error types.

#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("Presence channel not joined yet")]
    NotJoined,

    #[error("Presence channel is closed")]
    Closed,

    #[error("Presence channel refused join for session: {0}")]
    JoinRefused(String),

    #[error("Malformed channel payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl SyncError {
    /// Errors that clear up once the channel (re)joins.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::NotJoined)
    }
}
