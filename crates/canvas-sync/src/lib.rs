//! Shared-canvas session sync
//!
//! - `protocol`: presence and progress payloads, validated on ingestion
//! - `channel`: the owned presence connection and an in-memory hub
//! - `session`: `SessionSyncService`, local publish and remote mirrors

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod channel;
pub mod error;
pub mod protocol;
pub mod session;

pub use channel::{ChannelEvent, ChannelState, HubConnection, PresenceChannel, PresenceHub};
pub use error::SyncError;
pub use protocol::{ProgressEvent, TrackPayload};
pub use session::{SessionEntry, SessionId, SessionSyncService, SyncUpdate};
