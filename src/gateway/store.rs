use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use futures_util::future::BoxFuture;

use super::events::{Event, RoomId};
use crate::error::AppError;

pub trait EventStore: Send + Sync {
    fn save<'a>(&'a self, event: &'a Event) -> BoxFuture<'a, Result<(), AppError>>;

    /// Up to `limit` most recent events for `room`, oldest first.
    fn recent<'a>(
        &'a self,
        room: &'a RoomId,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Event>, AppError>>;
}

/// Bounded in-process store keeping the last `capacity` events per room.
#[derive(Debug)]
pub struct MemoryEventStore {
    capacity: usize,
    rooms: Mutex<HashMap<RoomId, VecDeque<Event>>>,
}

impl MemoryEventStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self, room: &RoomId) -> usize {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room)
            .map_or(0, VecDeque::len)
    }

    fn push(&self, event: &Event) {
        if self.capacity == 0 {
            return;
        }
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        let log = rooms.entry(event.room().clone()).or_default();
        if log.len() == self.capacity {
            log.pop_front();
        }
        log.push_back(event.clone());
    }

    fn tail(&self, room: &RoomId, limit: usize) -> Vec<Event> {
        let rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        rooms
            .get(room)
            .map(|log| {
                let skip = log.len().saturating_sub(limit);
                log.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }
}

impl EventStore for MemoryEventStore {
    fn save<'a>(&'a self, event: &'a Event) -> BoxFuture<'a, Result<(), AppError>> {
        self.push(event);
        Box::pin(async { Ok(()) })
    }

    fn recent<'a>(
        &'a self,
        room: &'a RoomId,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Event>, AppError>> {
        let events = self.tail(room, limit);
        Box::pin(async move { Ok(events) })
    }
}
