use sqlx::{Row, SqlitePool};

use crate::error::AppError;
use crate::models::user::{CreateUser, User};
use crate::snowflake;

fn row_to_user(row: sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        display_name: row.get("display_name"),
        created_at: row.get("created_at"),
    }
}

const SELECT_USERS: &str = "SELECT id, username, display_name, created_at FROM users";

pub async fn get_user(pool: &SqlitePool, user_id: &str) -> Result<User, AppError> {
    let row = sqlx::query(&format!("{SELECT_USERS} WHERE id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("unknown_user".to_string()))?;

    Ok(row_to_user(row))
}

pub async fn get_user_by_username(pool: &SqlitePool, username: &str) -> Result<User, AppError> {
    let row = sqlx::query(&format!("{SELECT_USERS} WHERE username = ?"))
        .bind(username)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("unknown_user".to_string()))?;

    Ok(row_to_user(row))
}

pub async fn create_user(pool: &SqlitePool, input: &CreateUser) -> Result<User, AppError> {
    let username = input.username.trim();
    if username.is_empty() || username.chars().count() > 32 {
        return Err(AppError::BadRequest(
            "username must be between 1 and 32 characters".to_string(),
        ));
    }

    let id = snowflake::generate();
    let display_name = input.display_name.as_deref().unwrap_or(username);

    sqlx::query("INSERT INTO users (id, username, display_name) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(username)
        .bind(display_name)
        .execute(pool)
        .await?;

    get_user(pool, &id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;

    #[tokio::test]
    async fn create_and_lookup() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let user = create_user(
            &pool,
            &CreateUser {
                username: "alice".into(),
                display_name: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(user.display_name.as_deref(), Some("alice"));
        let found = get_user_by_username(&pool, "alice").await.unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let input = CreateUser {
            username: "bob".into(),
            display_name: None,
        };
        create_user(&pool, &input).await.unwrap();
        let err = create_user(&pool, &input).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn blank_username_is_rejected() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let err = create_user(
            &pool,
            &CreateUser {
                username: "   ".into(),
                display_name: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn username_limit_counts_characters() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let at_limit = CreateUser {
            username: "é".repeat(32),
            display_name: None,
        };
        assert!(create_user(&pool, &at_limit).await.is_ok());

        let over = CreateUser {
            username: "é".repeat(33),
            display_name: None,
        };
        let err = create_user(&pool, &over).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
