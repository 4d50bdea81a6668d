use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use crate::db;
use crate::error::AppError;
use crate::middleware::auth::{bearer_token, AuthUser};
use crate::state::AppState;

/// Revoke the bearer token this request was made with. Other tokens of the
/// same user and already-open sessions are left alone.
pub async fn logout(
    auth: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

    if !db::auth::revoke_token(&state.db, token).await? {
        return Err(AppError::Unauthorized("token already revoked".to_string()));
    }
    tracing::info!(user_id = %auth.user_id, "token revoked");

    Ok(StatusCode::NO_CONTENT)
}
