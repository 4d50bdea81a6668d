use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::gateway::events::Identity;
use crate::state::AppState;

pub const PUBLISH_KEY_HEADER: &str = "X-Publish-Key";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
}

impl AuthUser {
    /// The identity the gateway uses for membership checks and own-message
    /// rendering.
    pub fn identity(&self) -> Identity {
        Identity::new(self.username.as_str())
    }
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Look up a raw bearer token. Unknown and expired tokens resolve to `None`.
pub async fn resolve_token(pool: &SqlitePool, token: &str) -> Option<AuthUser> {
    let token_hash = hash_token(token);
    let row = sqlx::query_as::<_, (String, String, String)>(
        "SELECT ut.user_id, u.username, ut.expires_at FROM user_tokens ut JOIN users u ON ut.user_id = u.id WHERE ut.token_hash = ?",
    )
    .bind(&token_hash)
    .fetch_optional(pool)
    .await
    .inspect_err(|e| tracing::error!("token lookup failed: {e}"))
    .ok()??;

    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    if row.2 < now {
        return None;
    }

    Some(AuthUser {
        user_id: row.0,
        username: row.1,
    })
}

/// The token part of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn unauthorized(message: &str) -> AppError {
    AppError::Unauthorized(message.to_string())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let pool = state.db.clone();
        let token = bearer_token(&parts.headers).map(str::to_string);

        async move {
            let token = token.ok_or_else(|| unauthorized("invalid or missing authentication"))?;
            resolve_token(&pool, &token)
                .await
                .ok_or_else(|| unauthorized("invalid or missing authentication"))
        }
    }
}

/// Guard for operator endpoints: the request must carry the configured
/// publish key. With no key configured every request is refused.
pub struct Operator;

impl FromRequestParts<AppState> for Operator {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let outcome = match (&state.publish_key, parts.headers.get(PUBLISH_KEY_HEADER)) {
            (None, _) => Err(unauthorized("publishing is disabled on this server")),
            (Some(expected), Some(given)) => {
                let given = given.to_str().unwrap_or_default();
                // Compared as digests, never as raw keys.
                if hash_token(given) == hash_token(expected) {
                    Ok(Operator)
                } else {
                    Err(unauthorized("invalid publish key"))
                }
            }
            (Some(_), None) => Err(unauthorized("missing publish key")),
        };

        std::future::ready(outcome)
    }
}

/// Helper to create a token hash for token creation.
pub fn create_token_hash(token: &str) -> String {
    hash_token(token)
}

/// Generate a random token string.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
