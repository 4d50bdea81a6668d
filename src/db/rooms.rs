use futures_util::future::BoxFuture;
use sqlx::{Row, SqlitePool};

use crate::error::AppError;
use crate::gateway::events::{Identity, RoomId};
use crate::gateway::membership::MembershipAuthority;
use crate::models::room::{CreateRoom, Room};
use crate::snowflake;

fn row_to_room(row: sqlx::sqlite::SqliteRow) -> Room {
    Room {
        id: row.get("id"),
        name: row.get("name"),
        public: row.get("public"),
        created_at: row.get("created_at"),
    }
}

const SELECT_ROOMS: &str = "SELECT id, name, public, created_at FROM rooms";

pub async fn get_room(pool: &SqlitePool, room_id: &str) -> Result<Room, AppError> {
    let row = sqlx::query(&format!("{SELECT_ROOMS} WHERE id = ?"))
        .bind(room_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("unknown_room".to_string()))?;

    Ok(row_to_room(row))
}

pub async fn create_room(pool: &SqlitePool, input: &CreateRoom) -> Result<Room, AppError> {
    let name = input.name.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(AppError::BadRequest(
            "room name must be between 1 and 100 characters".to_string(),
        ));
    }

    let id = match input.id.as_deref().map(str::trim) {
        Some("") => return Err(AppError::BadRequest("room id must not be empty".to_string())),
        Some(id) if id.chars().count() > 64 || id.contains('/') => {
            return Err(AppError::BadRequest(
                "room id must be at most 64 characters and contain no '/'".to_string(),
            ))
        }
        Some(id) => id.to_string(),
        None => snowflake::generate(),
    };

    sqlx::query("INSERT INTO rooms (id, name, public) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(name)
        .bind(input.public)
        .execute(pool)
        .await?;

    get_room(pool, &id).await
}

/// Create `room_id` unless it already exists. Returns true if it was created.
pub async fn ensure_room(
    pool: &SqlitePool,
    room_id: &str,
    name: &str,
    public: bool,
) -> Result<bool, AppError> {
    let result = sqlx::query("INSERT OR IGNORE INTO rooms (id, name, public) VALUES (?, ?, ?)")
        .bind(room_id)
        .bind(name)
        .bind(public)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Returns false if the user was already a member.
pub async fn add_member(pool: &SqlitePool, room_id: &str, user_id: &str) -> Result<bool, AppError> {
    let result =
        sqlx::query("INSERT OR IGNORE INTO room_members (room_id, user_id) VALUES (?, ?)")
            .bind(room_id)
            .bind(user_id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Returns false if the user was not a member.
pub async fn remove_member(
    pool: &SqlitePool,
    room_id: &str,
    user_id: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM room_members WHERE room_id = ? AND user_id = ?")
        .bind(room_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Whether `username` may join `room_id`: the room exists and is public, or
/// the user holds a membership row. Unknown rooms admit nobody.
pub async fn can_join(pool: &SqlitePool, room_id: &str, username: &str) -> Result<bool, AppError> {
    let row = sqlx::query_as::<_, (bool, bool)>(
        "SELECT r.public, EXISTS(
             SELECT 1 FROM room_members m JOIN users u ON m.user_id = u.id
             WHERE m.room_id = r.id AND u.username = ?
         ) FROM rooms r WHERE r.id = ?",
    )
    .bind(username)
    .bind(room_id)
    .fetch_optional(pool)
    .await?;

    Ok(matches!(row, Some((public, member)) if public || member))
}

pub async fn list_rooms_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Room>, AppError> {
    let rows = sqlx::query(
        "SELECT r.id, r.name, r.public, r.created_at FROM rooms r
         JOIN room_members m ON m.room_id = r.id
         WHERE m.user_id = ? ORDER BY m.joined_at, r.id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_room).collect())
}

/// Membership authority backed by the `rooms` and `room_members` tables.
#[derive(Clone)]
pub struct SqliteMembership {
    pool: SqlitePool,
}

impl SqliteMembership {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl MembershipAuthority for SqliteMembership {
    fn is_authorized<'a>(
        &'a self,
        identity: &'a Identity,
        room: &'a RoomId,
    ) -> BoxFuture<'a, Result<bool, AppError>> {
        Box::pin(can_join(&self.pool, room.as_str(), identity.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, users};
    use crate::models::user::CreateUser;

    async fn user(pool: &SqlitePool, name: &str) -> String {
        users::create_user(
            pool,
            &CreateUser {
                username: name.to_string(),
                display_name: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    fn room(id: &str, public: bool) -> CreateRoom {
        CreateRoom {
            id: Some(id.to_string()),
            name: id.to_string(),
            public,
        }
    }

    #[tokio::test]
    async fn private_room_admits_members_only() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let alice = user(&pool, "alice").await;
        user(&pool, "bob").await;
        create_room(&pool, &room("chat_1", false)).await.unwrap();
        add_member(&pool, "chat_1", &alice).await.unwrap();

        let authority = SqliteMembership::new(pool.clone());
        let chat_1 = RoomId::from("chat_1");
        assert!(authority
            .is_authorized(&Identity::from("alice"), &chat_1)
            .await
            .unwrap());
        assert!(!authority
            .is_authorized(&Identity::from("bob"), &chat_1)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn public_room_admits_anyone_and_unknown_room_nobody() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        create_room(&pool, &room("status", true)).await.unwrap();

        let authority = SqliteMembership::new(pool);
        let anyone = Identity::from("anyone");
        assert!(authority
            .is_authorized(&anyone, &RoomId::from("status"))
            .await
            .unwrap());
        assert!(!authority
            .is_authorized(&anyone, &RoomId::from("nope"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn membership_changes_are_reported() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let alice = user(&pool, "alice").await;
        create_room(&pool, &room("r", false)).await.unwrap();

        assert!(add_member(&pool, "r", &alice).await.unwrap());
        assert!(!add_member(&pool, "r", &alice).await.unwrap());
        assert_eq!(list_rooms_for_user(&pool, &alice).await.unwrap().len(), 1);
        assert!(remove_member(&pool, "r", &alice).await.unwrap());
        assert!(!remove_member(&pool, "r", &alice).await.unwrap());
        assert!(!can_join(&pool, "r", "alice").await.unwrap());
    }

    #[tokio::test]
    async fn generated_ids_and_validation() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let created = create_room(
            &pool,
            &CreateRoom {
                id: None,
                name: "lobby".into(),
                public: true,
            },
        )
        .await
        .unwrap();
        assert!(created.id.parse::<u64>().is_ok());

        let err = create_room(&pool, &room("a/b", false)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn limits_count_characters_not_bytes() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let wide = CreateRoom {
            id: Some("ü".repeat(64)),
            name: "ü".repeat(100),
            public: false,
        };
        assert!(create_room(&pool, &wide).await.is_ok());

        let too_long = CreateRoom {
            id: Some("ü".repeat(65)),
            name: "x".into(),
            public: false,
        };
        let err = create_room(&pool, &too_long).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn ensure_room_is_idempotent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        assert!(ensure_room(&pool, "status", "Status", true).await.unwrap());
        assert!(!ensure_room(&pool, "status", "Renamed", false).await.unwrap());

        let room = get_room(&pool, "status").await.unwrap();
        assert_eq!(room.name, "Status");
        assert!(room.public);
    }
}
