//! Presence channel abstraction and an in-memory hub.
//!
//! A [`PresenceChannel`] is an owned connection with an explicit
//! open/close lifecycle. [`PresenceHub`] is the server side kept in process:
//! every connection gets a mailbox, joins are acknowledged on the next
//! [`PresenceChannel::poll`], and every track or leave broadcasts the full
//! membership snapshot to everyone.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use crate::error::SyncError;
use crate::protocol::{ProgressEvent, TrackPayload};

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// Not connected
    #[default]
    Closed,
    /// Join sent, waiting for the acknowledgement
    Joining,
    /// Join acknowledged; tracking is allowed
    Joined,
}

/// Inbound channel traffic, drained by [`PresenceChannel::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Join acknowledged
    Joined,
    /// Full membership snapshot
    PresenceSync(serde_json::Value),
    /// Generation progress event
    Progress(serde_json::Value),
}

pub trait PresenceChannel {
    fn state(&self) -> ChannelState;

    /// Request to join under `session_name`. An already open connection is
    /// closed first.
    fn open(&mut self, session_name: &str) -> Result<(), SyncError>;

    fn close(&mut self);

    /// Replace this session's presence metadata.
    fn track(&mut self, payload: &TrackPayload) -> Result<(), SyncError>;

    /// Drain everything received since the last poll.
    fn poll(&mut self) -> Vec<ChannelEvent>;
}

struct Mailbox {
    session: String,
    queue: VecDeque<ChannelEvent>,
}

struct HubInner {
    accept_joins: bool,
    next_id: u64,
    members: BTreeMap<String, serde_json::Value>,
    mailboxes: HashMap<u64, Mailbox>,
}

impl HubInner {
    fn presence_state(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.members
                .iter()
                .map(|(name, member)| (name.clone(), member.clone()))
                .collect(),
        )
    }

    fn broadcast(&mut self, event: &ChannelEvent) {
        for mailbox in self.mailboxes.values_mut() {
            mailbox.queue.push_back(event.clone());
        }
    }

    fn broadcast_presence(&mut self) {
        let event = ChannelEvent::PresenceSync(self.presence_state());
        self.broadcast(&event);
    }
}

/// Shared in-memory presence server.
#[derive(Clone)]
pub struct PresenceHub {
    inner: Arc<Mutex<HubInner>>,
}

impl Default for PresenceHub {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                accept_joins: true,
                next_id: 0,
                members: BTreeMap::new(),
                mailboxes: HashMap::new(),
            })),
        }
    }

    /// New closed connection to this hub.
    pub fn connect(&self) -> HubConnection {
        HubConnection {
            hub: self.clone(),
            id: None,
            state: ChannelState::Closed,
        }
    }

    /// When false, later joins are refused and never acknowledged.
    pub fn set_accept_joins(&self, accept: bool) {
        self.inner.lock().accept_joins = accept;
    }

    /// Broadcast a `"progress"` event to every open connection.
    pub fn publish_progress(&self, event: &ProgressEvent) -> Result<(), SyncError> {
        let payload = serde_json::to_value(event)?;
        self.broadcast(ChannelEvent::Progress(payload));
        Ok(())
    }

    /// Push a raw event to every open connection.
    pub fn broadcast(&self, event: ChannelEvent) {
        self.inner.lock().broadcast(&event);
    }

    /// Current membership snapshot, as sent in presence syncs.
    pub fn presence_state(&self) -> serde_json::Value {
        self.inner.lock().presence_state()
    }

    pub fn member_count(&self) -> usize {
        self.inner.lock().members.len()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().mailboxes.len()
    }

    fn join(&self, session: &str) -> Result<u64, SyncError> {
        let mut inner = self.inner.lock();
        if !inner.accept_joins {
            tracing::warn!(session, "presence join refused");
            return Err(SyncError::JoinRefused(session.to_string()));
        }

        let id = inner.next_id;
        inner.next_id += 1;
        let snapshot = inner.presence_state();
        inner.mailboxes.insert(
            id,
            Mailbox {
                session: session.to_string(),
                queue: VecDeque::from([
                    ChannelEvent::Joined,
                    ChannelEvent::PresenceSync(snapshot),
                ]),
            },
        );
        tracing::debug!(session, id, "presence join accepted");
        Ok(id)
    }

    fn track(&self, id: u64, payload: &TrackPayload) -> Result<(), SyncError> {
        let meta = serde_json::to_value(payload)?;
        let mut inner = self.inner.lock();
        let session = inner
            .mailboxes
            .get(&id)
            .map(|mailbox| mailbox.session.clone())
            .ok_or(SyncError::Closed)?;
        inner.members.insert(session, json!({ "metas": [meta] }));
        inner.broadcast_presence();
        Ok(())
    }

    fn leave(&self, id: u64) {
        let mut inner = self.inner.lock();
        let Some(mailbox) = inner.mailboxes.remove(&id) else {
            return;
        };
        let still_present = inner
            .mailboxes
            .values()
            .any(|other| other.session == mailbox.session);
        if !still_present && inner.members.remove(&mailbox.session).is_some() {
            inner.broadcast_presence();
        }
        tracing::debug!(session = %mailbox.session, id, "presence left");
    }

    fn drain(&self, id: u64) -> Vec<ChannelEvent> {
        self.inner
            .lock()
            .mailboxes
            .get_mut(&id)
            .map(|mailbox| mailbox.queue.drain(..).collect())
            .unwrap_or_default()
    }
}

/// An owned connection to a [`PresenceHub`]. Leaves the channel on drop.
pub struct HubConnection {
    hub: PresenceHub,
    id: Option<u64>,
    state: ChannelState,
}

impl PresenceChannel for HubConnection {
    fn state(&self) -> ChannelState {
        self.state
    }

    fn open(&mut self, session_name: &str) -> Result<(), SyncError> {
        if self.id.is_some() {
            self.close();
        }
        let id = self.hub.join(session_name)?;
        self.id = Some(id);
        self.state = ChannelState::Joining;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(id) = self.id.take() {
            self.hub.leave(id);
        }
        self.state = ChannelState::Closed;
    }

    fn track(&mut self, payload: &TrackPayload) -> Result<(), SyncError> {
        match (self.state, self.id) {
            (ChannelState::Joined, Some(id)) => self.hub.track(id, payload),
            (ChannelState::Joining, _) => Err(SyncError::NotJoined),
            _ => Err(SyncError::Closed),
        }
    }

    fn poll(&mut self) -> Vec<ChannelEvent> {
        let Some(id) = self.id else {
            return Vec::new();
        };
        let events = self.hub.drain(id);
        if events.contains(&ChannelEvent::Joined) {
            self.state = ChannelState::Joined;
        }
        events
    }
}

impl Drop for HubConnection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_core::SelectionBox;

    fn payload(x: f32) -> TrackPayload {
        TrackPayload {
            selection_box: SelectionBox::new(x, 0.0, 64.0, 64.0),
        }
    }

    #[test]
    fn test_join_acknowledged_on_poll() {
        let hub = PresenceHub::new();
        let mut conn = hub.connect();
        assert_eq!(conn.state(), ChannelState::Closed);

        conn.open("a").unwrap();
        assert_eq!(conn.state(), ChannelState::Joining);
        assert!(matches!(conn.track(&payload(0.0)), Err(SyncError::NotJoined)));

        let events = conn.poll();
        assert_eq!(events[0], ChannelEvent::Joined);
        assert_eq!(conn.state(), ChannelState::Joined);
        conn.track(&payload(0.0)).unwrap();
        assert_eq!(hub.member_count(), 1);
    }

    #[test]
    fn test_track_broadcasts_full_state() {
        let hub = PresenceHub::new();
        let mut a = hub.connect();
        let mut b = hub.connect();
        a.open("a").unwrap();
        b.open("b").unwrap();
        a.poll();
        b.poll();

        a.track(&payload(8.0)).unwrap();
        b.track(&payload(16.0)).unwrap();

        let last = a.poll().pop().unwrap();
        let ChannelEvent::PresenceSync(state) = last else {
            panic!("expected presence sync, got {last:?}");
        };
        assert_eq!(state["a"]["metas"][0]["selection_box"]["x"], 8.0);
        assert_eq!(state["b"]["metas"][0]["selection_box"]["x"], 16.0);
    }

    #[test]
    fn test_refused_join_stays_closed() {
        let hub = PresenceHub::new();
        hub.set_accept_joins(false);
        let mut conn = hub.connect();

        assert!(matches!(conn.open("a"), Err(SyncError::JoinRefused(_))));
        assert_eq!(conn.state(), ChannelState::Closed);
        assert!(conn.poll().is_empty());
        assert!(matches!(conn.track(&payload(0.0)), Err(SyncError::Closed)));
    }

    #[test]
    fn test_drop_leaves_channel() {
        let hub = PresenceHub::new();
        let mut watcher = hub.connect();
        watcher.open("watcher").unwrap();
        watcher.poll();

        {
            let mut conn = hub.connect();
            conn.open("a").unwrap();
            conn.poll();
            conn.track(&payload(0.0)).unwrap();
            assert_eq!(hub.member_count(), 1);
        }

        assert_eq!(hub.member_count(), 0);
        assert_eq!(hub.connection_count(), 1);
        let last = watcher.poll().pop().unwrap();
        assert_eq!(last, ChannelEvent::PresenceSync(serde_json::json!({})));
    }

    #[test]
    fn test_progress_reaches_every_connection() {
        let hub = PresenceHub::new();
        let mut a = hub.connect();
        a.open("a").unwrap();
        a.poll();

        hub.publish_progress(&ProgressEvent {
            progress: 25.0,
            is_generating: true,
            generating_session_name: "a".into(),
            ..ProgressEvent::default()
        })
        .unwrap();

        let events = a.poll();
        let [ChannelEvent::Progress(value)] = events.as_slice() else {
            panic!("expected one progress event, got {events:?}");
        };
        assert_eq!(value["progress"], 25.0);
        assert_eq!(value["isGenerating"], true);
    }
}
