use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::db;
use crate::error::AppError;
use crate::middleware::auth::{AuthUser, Operator};
use crate::models::room::Room;
use crate::models::user::{CreateUser, User};
use crate::models::DataResponse;
use crate::state::AppState;

/// Provision a user and hand back its first bearer token. The raw token is
/// only ever shown here.
pub async fn create_user(
    _operator: Operator,
    State(state): State<AppState>,
    Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let user = db::users::create_user(&state.db, &input).await?;
    let token = db::auth::issue_token(&state.db, &user.id).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "user created");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "data": {
                "user": user,
                "token": token,
            }
        })),
    ))
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<DataResponse<User>>, AppError> {
    let user = db::users::get_user(&state.db, &auth.user_id).await?;
    Ok(Json(DataResponse { data: user }))
}

pub async fn list_current_user_rooms(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<DataResponse<Vec<Room>>>, AppError> {
    let rooms = db::rooms::list_rooms_for_user(&state.db, &auth.user_id).await?;
    Ok(Json(DataResponse { data: rooms }))
}
