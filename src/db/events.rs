use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use sqlx::{Row, SqlitePool};

use crate::error::AppError;
use crate::gateway::events::{Event, Identity, RoomId};
use crate::gateway::store::EventStore;

pub async fn insert_event(pool: &SqlitePool, event: &Event) -> Result<(), AppError> {
    let (sender, body) = match event {
        Event::ChatMessage { sender, body, .. } => (Some(sender.as_str()), body.as_str()),
        Event::StatusUpdate { status, .. } => (None, status.as_str()),
    };

    sqlx::query(
        "INSERT INTO events (id, room_id, kind, sender, body, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(event.id())
    .bind(event.room().as_str())
    .bind(event.kind())
    .bind(sender)
    .bind(body)
    .bind(event.timestamp().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

fn row_to_event(row: sqlx::sqlite::SqliteRow) -> Result<Event, AppError> {
    let id: String = row.get("id");
    let room = RoomId::new(row.get::<String, _>("room_id"));
    let kind: String = row.get("kind");
    let sender: Option<String> = row.get("sender");
    let body: String = row.get("body");
    let created_at: String = row.get("created_at");

    let timestamp = DateTime::parse_from_rfc3339(&created_at)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(format!("event {id} has bad timestamp: {e}")))?;

    match (kind.as_str(), sender) {
        ("chat_message", Some(sender)) => Ok(Event::restore_chat(
            id,
            room,
            Identity::new(sender),
            body,
            timestamp,
        )),
        ("status_update", _) => Ok(Event::restore_status(id, room, body, timestamp)),
        (other, _) => Err(AppError::Internal(format!(
            "event {id} has unreadable kind {other:?}"
        ))),
    }
}

/// Page of events for `room_id`, oldest first. With `before`, only events
/// older than that id are considered.
pub async fn list_events(
    pool: &SqlitePool,
    room_id: &str,
    before: Option<&str>,
    limit: i64,
) -> Result<Vec<Event>, AppError> {
    let rows = match before {
        Some(before) => {
            sqlx::query(
                "SELECT id, room_id, kind, sender, body, created_at FROM events
                 WHERE room_id = ? AND CAST(id AS INTEGER) < CAST(? AS INTEGER)
                 ORDER BY CAST(id AS INTEGER) DESC LIMIT ?",
            )
            .bind(room_id)
            .bind(before)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT id, room_id, kind, sender, body, created_at FROM events
                 WHERE room_id = ? ORDER BY CAST(id AS INTEGER) DESC LIMIT ?",
            )
            .bind(room_id)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };

    let mut events = rows
        .into_iter()
        .map(row_to_event)
        .collect::<Result<Vec<_>, _>>()?;
    events.reverse();
    Ok(events)
}

/// Event store on the `events` table.
#[derive(Clone)]
pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl EventStore for SqliteEventStore {
    fn save<'a>(&'a self, event: &'a Event) -> BoxFuture<'a, Result<(), AppError>> {
        Box::pin(insert_event(&self.pool, event))
    }

    fn recent<'a>(
        &'a self,
        room: &'a RoomId,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Event>, AppError>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Box::pin(list_events(&self.pool, room.as_str(), None, limit))
    }
}
