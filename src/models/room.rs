use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    /// Public rooms admit any authenticated identity.
    pub public: bool,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoom {
    /// Defaults to a fresh snowflake.
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub public: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomPresence {
    pub room_id: String,
    pub connected: usize,
}
