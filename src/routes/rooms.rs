use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::db;
use crate::error::AppError;
use crate::gateway::events::{Event, RoomId};
use crate::middleware::auth::{AuthUser, Operator};
use crate::models::room::{CreateRoom, Room, RoomPresence};
use crate::models::{Cursor, DataResponse, ListResponse};
use crate::state::AppState;

const DEFAULT_HISTORY_PAGE: i64 = 50;
const MAX_HISTORY_PAGE: i64 = 100;

/// Read endpoints follow the same rule as joining: the caller must be allowed
/// into the room.
async fn require_access(state: &AppState, room_id: &str, auth: &AuthUser) -> Result<(), AppError> {
    if db::rooms::can_join(&state.db, room_id, &auth.username).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden("not a member of this room".to_string()))
    }
}

pub async fn create_room(
    _operator: Operator,
    State(state): State<AppState>,
    Json(input): Json<CreateRoom>,
) -> Result<(StatusCode, Json<DataResponse<Room>>), AppError> {
    let room = db::rooms::create_room(&state.db, &input).await?;
    tracing::info!(room = %room.id, public = room.public, "room created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: room })))
}

pub async fn get_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<DataResponse<Room>>, AppError> {
    require_access(&state, &room_id, &auth).await?;
    let room = db::rooms::get_room(&state.db, &room_id).await?;
    Ok(Json(DataResponse { data: room }))
}

pub async fn add_member(
    _operator: Operator,
    State(state): State<AppState>,
    Path((room_id, username)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    db::rooms::get_room(&state.db, &room_id).await?;
    let user = db::users::get_user_by_username(&state.db, &username).await?;
    db::rooms::add_member(&state.db, &room_id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Revokes membership and closes any live sessions the user still has in the
/// room, unless the room is public and they may stay anyway.
pub async fn remove_member(
    _operator: Operator,
    State(state): State<AppState>,
    Path((room_id, username)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let user = db::users::get_user_by_username(&state.db, &username).await?;
    if !db::rooms::remove_member(&state.db, &room_id, &user.id).await? {
        return Err(AppError::NotFound("unknown_member".to_string()));
    }

    if !db::rooms::can_join(&state.db, &room_id, &user.username).await? {
        let room = RoomId::new(room_id);
        let closed = state
            .gateway
            .registry()
            .members(&room)
            .into_iter()
            .filter(|handle| handle.identity.as_str() == user.username)
            .filter(|handle| state.gateway.disconnect(handle.session_id))
            .count();
        if closed > 0 {
            tracing::info!(room = %room, username = %user.username, closed, "closed sessions after revoke");
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub before: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_messages(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ListResponse<Event>>, AppError> {
    require_access(&state, &room_id, &auth).await?;

    if let Some(before) = query.before.as_deref() {
        if before.parse::<u64>().is_err() {
            return Err(AppError::BadRequest("before must be an event id".to_string()));
        }
    }
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_PAGE)
        .clamp(1, MAX_HISTORY_PAGE);

    // One extra row tells us whether an older page exists.
    let mut events =
        db::events::list_events(&state.db, &room_id, query.before.as_deref(), limit + 1).await?;
    let has_more = events.len() as i64 > limit;
    if has_more {
        events.remove(0);
    }

    let cursor = events.first().map(|oldest| Cursor {
        before: oldest.id().to_string(),
        has_more,
    });

    Ok(Json(ListResponse {
        data: events,
        cursor,
    }))
}

pub async fn get_presence(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<DataResponse<RoomPresence>>, AppError> {
    require_access(&state, &room_id, &auth).await?;
    let connected = state
        .gateway
        .registry()
        .member_count(&RoomId::new(room_id.as_str()));
    Ok(Json(DataResponse {
        data: RoomPresence { room_id, connected },
    }))
}

#[derive(Debug, Deserialize)]
pub struct PublishStatus {
    pub status: String,
}

/// Injects a status update through the event bridge. The room does not need
/// a `rooms` row: status groups such as `status` exist only while someone
/// listens.
pub async fn publish_status(
    _operator: Operator,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(input): Json<PublishStatus>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let status = input.status.trim();
    if status.is_empty() || status.chars().count() > 256 {
        return Err(AppError::BadRequest(
            "status must be between 1 and 256 characters".to_string(),
        ));
    }

    let room = RoomId::new(room_id);
    let event = Event::status(room.clone(), status);
    let event_id = event.id().to_string();
    let report = state.gateway.bridge().publish(&room, event).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "data": {
                "event_id": event_id,
                "room_id": room,
                "delivered": report.delivered,
                "failed": report.failed.len(),
            }
        })),
    ))
}
