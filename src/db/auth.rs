use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::middleware::auth::{create_token_hash, generate_token};

pub const TOKEN_TTL_DAYS: i64 = 30;

/// Mint a bearer token for `user_id`. Only the hash is stored; the raw token
/// is returned once and cannot be recovered later.
pub async fn issue_token(pool: &SqlitePool, user_id: &str) -> Result<String, AppError> {
    let token = generate_token();
    let expires_at = (Utc::now() + Duration::days(TOKEN_TTL_DAYS))
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string();

    sqlx::query("INSERT INTO user_tokens (token_hash, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(create_token_hash(&token))
        .bind(user_id)
        .bind(&expires_at)
        .execute(pool)
        .await?;

    Ok(token)
}

pub async fn revoke_token(pool: &SqlitePool, token: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM user_tokens WHERE token_hash = ?")
        .bind(create_token_hash(token))
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn purge_expired_tokens(pool: &SqlitePool) -> Result<u64, AppError> {
    let now = Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    let result = sqlx::query("DELETE FROM user_tokens WHERE expires_at < ?")
        .bind(&now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
