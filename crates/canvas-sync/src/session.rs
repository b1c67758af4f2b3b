//! Multi-session selection sync.
//!
//! [`SessionSyncService`] owns its channel, publishes the local box and keeps
//! read-only mirrors of every other session. Remote state is replaced
//! wholesale on each presence sync; the local id never appears among the
//! remote sessions.

use std::collections::BTreeMap;
use std::fmt;

use canvas_core::{ProgressSnapshot, SelectionBox};
use serde::{Deserialize, Serialize};

use crate::channel::{ChannelEvent, ChannelState, PresenceChannel};
use crate::error::SyncError;
use crate::protocol::{PresenceState, ProgressEvent, TrackPayload, parse_presence};

/// Process-lifetime session identifier, also the presence join name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh random id (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One session's box and generation status.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEntry {
    pub session_id: SessionId,
    pub selection_box: SelectionBox,
    pub is_generating: bool,
    /// 0..=100
    pub progress: f32,
}

impl SessionEntry {
    pub fn new(session_id: SessionId, selection_box: SelectionBox) -> Self {
        Self {
            session_id,
            selection_box,
            is_generating: false,
            progress: 0.0,
        }
    }
}

/// What a [`SessionSyncService::pump`] changed.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncUpdate {
    /// Join acknowledged; the local box has been tracked.
    Joined,
    /// Remote session map replaced.
    RemoteSessions,
    /// Progress event, also for sessions not yet seen in presence.
    Progress(ProgressSnapshot),
}

pub struct SessionSyncService<C: PresenceChannel> {
    channel: C,
    local: SessionEntry,
    remote: BTreeMap<SessionId, SessionEntry>,
    dropped_publishes: u64,
}

impl<C: PresenceChannel> SessionSyncService<C> {
    /// Service with a freshly generated session id.
    pub fn new(channel: C, initial_box: SelectionBox) -> Self {
        Self::with_session_id(SessionId::generate(), channel, initial_box)
    }

    pub fn with_session_id(session_id: SessionId, channel: C, initial_box: SelectionBox) -> Self {
        Self {
            channel,
            local: SessionEntry::new(session_id, initial_box),
            remote: BTreeMap::new(),
            dropped_publishes: 0,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.local.session_id
    }

    pub fn local(&self) -> &SessionEntry {
        &self.local
    }

    /// Every other session, keyed by id. Never contains the local id.
    pub fn remote_sessions(&self) -> &BTreeMap<SessionId, SessionEntry> {
        &self.remote
    }

    pub fn remote(&self, session_id: &SessionId) -> Option<&SessionEntry> {
        self.remote.get(session_id)
    }

    pub fn is_joined(&self) -> bool {
        self.channel.state() == ChannelState::Joined
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    /// Publishes dropped because the channel was not joined.
    pub fn dropped_publishes(&self) -> u64 {
        self.dropped_publishes
    }

    /// Join the presence channel under the local session id.
    pub fn open(&mut self) -> Result<(), SyncError> {
        tracing::info!(session = %self.local.session_id, "joining presence channel");
        self.channel.open(self.local.session_id.as_str())
    }

    /// Leave the channel and forget every remote session.
    pub fn close(&mut self) {
        self.channel.close();
        self.remote.clear();
        tracing::info!(session = %self.local.session_id, "left presence channel");
    }

    /// Record the local box and publish it. Returns whether it went out;
    /// while not joined the publish is dropped, and the next successful one
    /// carries the current box. Non-finite boxes are never sent.
    pub fn publish(&mut self, selection_box: SelectionBox) -> bool {
        if !selection_box.is_renderable() {
            tracing::warn!(
                session = %self.local.session_id,
                ?selection_box,
                "refusing to publish non-finite box"
            );
            return false;
        }
        self.local.selection_box = selection_box;
        let payload = TrackPayload { selection_box };
        match self.channel.track(&payload) {
            Ok(()) => true,
            Err(err) => {
                self.dropped_publishes += 1;
                if err.is_transient() || self.channel.state() == ChannelState::Closed {
                    tracing::debug!(
                        session = %self.local.session_id,
                        %err,
                        dropped = self.dropped_publishes,
                        "publish dropped"
                    );
                } else {
                    tracing::warn!(session = %self.local.session_id, %err, "publish failed");
                }
                false
            }
        }
    }

    /// Drain the channel and apply what arrived.
    pub fn pump(&mut self) -> Vec<SyncUpdate> {
        let mut updates = Vec::new();
        for event in self.channel.poll() {
            match event {
                ChannelEvent::Joined => {
                    tracing::info!(session = %self.local.session_id, "presence channel joined");
                    self.publish(self.local.selection_box);
                    updates.push(SyncUpdate::Joined);
                }
                ChannelEvent::PresenceSync(value) => match parse_presence(&value) {
                    Ok(state) => {
                        self.apply_presence(&state);
                        updates.push(SyncUpdate::RemoteSessions);
                    }
                    Err(err) => {
                        tracing::warn!(%err, "ignoring malformed presence sync");
                    }
                },
                ChannelEvent::Progress(value) => {
                    match serde_json::from_value::<ProgressEvent>(value) {
                        Ok(event) => {
                            let snapshot = event.into_snapshot();
                            self.apply_progress(&snapshot);
                            updates.push(SyncUpdate::Progress(snapshot));
                        }
                        Err(err) => {
                            tracing::warn!(%err, "ignoring malformed progress event");
                        }
                    }
                }
            }
        }
        updates
    }

    /// Replace the remote map with `state`, minus the local session.
    /// Generation status of sessions that stay present is kept.
    pub fn apply_presence(&mut self, state: &PresenceState) {
        let mut next = BTreeMap::new();
        for (name, member) in state {
            let session_id = SessionId::from(name.as_str());
            if session_id == self.local.session_id {
                continue;
            }
            let mut entry = SessionEntry::new(session_id.clone(), member.selection_box());
            if let Some(previous) = self.remote.get(&session_id) {
                entry.is_generating = previous.is_generating;
                entry.progress = previous.progress;
            }
            next.insert(session_id, entry);
        }
        tracing::debug!(
            session = %self.local.session_id,
            remote = next.len(),
            "presence synced"
        );
        self.remote = next;
    }

    /// Update the generating session's entry. Returns false when the
    /// session is unknown.
    pub fn apply_progress(&mut self, snapshot: &ProgressSnapshot) -> bool {
        let session_id = SessionId::from(snapshot.generating_session_id.as_str());
        let entry = if session_id == self.local.session_id {
            &mut self.local
        } else if let Some(entry) = self.remote.get_mut(&session_id) {
            entry
        } else {
            tracing::debug!(session = %session_id, "progress for unknown session");
            return false;
        };
        entry.is_generating = snapshot.is_generating;
        entry.progress = snapshot.progress;
        true
    }
}
