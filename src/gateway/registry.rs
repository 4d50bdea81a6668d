use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};

use super::events::{Identity, RoomId, SessionId};
use super::render::WireFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    Closed,
    Full,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Closed => f.write_str("outbound queue closed"),
            DeliveryError::Full => f.write_str("outbound queue full"),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// A rendered payload queued for one session, tagged with the event it came
/// from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub event_id: String,
    pub payload: String,
}

#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session_id: SessionId,
    pub identity: Identity,
    pub format: WireFormat,
    tx: mpsc::Sender<Outbound>,
    closer: Arc<Notify>,
}

impl SessionHandle {
    pub fn new(
        session_id: SessionId,
        identity: Identity,
        format: WireFormat,
        tx: mpsc::Sender<Outbound>,
        closer: Arc<Notify>,
    ) -> Self {
        Self {
            session_id,
            identity,
            format,
            tx,
            closer,
        }
    }

    pub fn deliver(&self, outbound: Outbound) -> Result<(), DeliveryError> {
        self.tx.try_send(outbound).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    // notify_one stores the permit if the session is not waiting yet.
    pub fn request_close(&self) {
        self.closer.notify_one();
    }
}

/// Live sessions per room. Each room's members sit in one `DashMap` entry, so
/// joins, leaves and snapshots on a room are serialized by its shard lock.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomId, HashMap<SessionId, SessionHandle>>,
    session_rooms: DashMap<SessionId, HashSet<RoomId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the session was already a member.
    pub fn join(&self, room: &RoomId, handle: SessionHandle) -> bool {
        let session_id = handle.session_id;
        let added = self
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(session_id, handle)
            .is_none();
        self.session_rooms
            .entry(session_id)
            .or_default()
            .insert(room.clone());
        added
    }

    /// Rooms left with no members are dropped.
    pub fn leave(&self, room: &RoomId, session_id: SessionId) -> bool {
        let removed = self.remove_member(room, session_id);

        if let Entry::Occupied(mut entry) = self.session_rooms.entry(session_id) {
            entry.get_mut().remove(room);
            if entry.get().is_empty() {
                entry.remove();
            }
        }

        removed
    }

    pub fn leave_all(&self, session_id: SessionId) -> Vec<RoomId> {
        let rooms = self
            .session_rooms
            .remove(&session_id)
            .map(|(_, rooms)| rooms)
            .unwrap_or_default();

        rooms
            .into_iter()
            .filter(|room| self.remove_member(room, session_id))
            .collect()
    }

    fn remove_member(&self, room: &RoomId, session_id: SessionId) -> bool {
        match self.rooms.entry(room.clone()) {
            Entry::Occupied(mut entry) => {
                let removed = entry.get_mut().remove(&session_id).is_some();
                if entry.get().is_empty() {
                    entry.remove();
                }
                removed
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Point-in-time copy of a room's members.
    pub fn members(&self, room: &RoomId) -> Vec<SessionHandle> {
        self.rooms
            .get(room)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, room: &RoomId, session_id: SessionId) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains_key(&session_id))
    }

    pub fn member_count(&self, room: &RoomId) -> usize {
        self.rooms.get(room).map_or(0, |members| members.len())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn handle(&self, session_id: SessionId) -> Option<SessionHandle> {
        let room = self.session_rooms.get(&session_id)?.iter().next()?.clone();
        self.rooms.get(&room)?.get(&session_id).cloned()
    }
}

/// Scoped membership: dropping it takes the session out of every room,
/// including when the owning task is cancelled.
pub struct Registration {
    registry: Arc<RoomRegistry>,
    session_id: SessionId,
}

impl Registration {
    pub fn join(registry: &Arc<RoomRegistry>, room: &RoomId, handle: SessionHandle) -> Self {
        let session_id = handle.session_id;
        registry.join(room, handle);
        Self {
            registry: Arc::clone(registry),
            session_id,
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let left = self.registry.leave_all(self.session_id);
        tracing::trace!(session_id = %self.session_id, "left {} room(s)", left.len());
    }
}
