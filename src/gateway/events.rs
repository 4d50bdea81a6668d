use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::snowflake;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Username of an authenticated user. The gateway only compares these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for Identity {
    fn from(key: String) -> Self {
        Self(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    ChatMessage {
        id: String,
        room: RoomId,
        sender: Identity,
        body: String,
        timestamp: DateTime<Utc>,
    },
    StatusUpdate {
        id: String,
        room: RoomId,
        status: String,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn chat(room: RoomId, sender: Identity, body: impl Into<String>) -> Self {
        Event::ChatMessage {
            id: snowflake::generate(),
            room,
            sender,
            body: body.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn status(room: RoomId, status: impl Into<String>) -> Self {
        Event::StatusUpdate {
            id: snowflake::generate(),
            room,
            status: status.into(),
            timestamp: Utc::now(),
        }
    }

    /// Rebuild a stored event without minting a new id.
    pub fn restore_chat(
        id: String,
        room: RoomId,
        sender: Identity,
        body: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Event::ChatMessage {
            id,
            room,
            sender,
            body,
            timestamp,
        }
    }

    pub fn restore_status(
        id: String,
        room: RoomId,
        status: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Event::StatusUpdate {
            id,
            room,
            status,
            timestamp,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Event::ChatMessage { id, .. } | Event::StatusUpdate { id, .. } => id,
        }
    }

    pub fn room(&self) -> &RoomId {
        match self {
            Event::ChatMessage { room, .. } | Event::StatusUpdate { room, .. } => room,
        }
    }

    /// Status updates have no sender; they never render as "own".
    pub fn sender(&self) -> Option<&Identity> {
        match self {
            Event::ChatMessage { sender, .. } => Some(sender),
            Event::StatusUpdate { .. } => None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::ChatMessage { timestamp, .. } | Event::StatusUpdate { timestamp, .. } => {
                *timestamp
            }
        }
    }

    // Matches the serde tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ChatMessage { .. } => "chat_message",
            Event::StatusUpdate { .. } => "status_update",
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Event::ChatMessage { .. } => "message.create",
            Event::StatusUpdate { .. } => "status.update",
        }
    }
}

pub mod opcode {
    pub const EVENT: u8 = 0;
}

/// WebSocket close codes.
pub mod close_code {
    pub const NORMAL: u16 = 1000;
    pub const POLICY_VIOLATION: u16 = 1008;
    pub const CLOSED_BY_SERVER: u16 = 4000;
    pub const NOT_AUTHENTICATED: u16 = 4003;
}

/// Inbound client payload, e.g. `{"chat_message": "hello"}`.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    pub chat_message: Option<String>,
}
