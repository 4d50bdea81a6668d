#![allow(dead_code)]

use axum::body::Body;
use http::{Method, Request};
use roomcast::db;
use roomcast::db::events::SqliteEventStore;
use roomcast::db::rooms::SqliteMembership;
use roomcast::gateway::{Gateway, GatewayConfig};
use roomcast::models::room::CreateRoom;
use roomcast::models::user::{CreateUser, User};
use roomcast::routes;
use roomcast::state::AppState;
use sqlx::SqlitePool;
use std::sync::Arc;

pub const PUBLISH_KEY: &str = "test-publish-key";

/// A user created for testing, bundling the User record with its raw token.
pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestUser {
    /// Returns the Authorization header value (`"Bearer xxx"`).
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Test server that owns an in-memory SQLite pool and full AppState.
/// Each instance is isolated and safe for parallel tests.
pub struct TestServer {
    pub state: AppState,
}

impl TestServer {
    /// Create a new TestServer with an in-memory SQLite database.
    pub async fn new() -> Self {
        Self::with_config(GatewayConfig::default()).await
    }

    pub async fn with_config(config: GatewayConfig) -> Self {
        let pool = db::create_pool("sqlite::memory:")
            .await
            .expect("failed to create test pool");

        let gateway = Gateway::new(Arc::new(SqliteMembership::new(pool.clone())), config)
            .with_store(Arc::new(SqliteEventStore::new(pool.clone())));

        let state = AppState {
            db: pool,
            gateway: Arc::new(gateway),
            publish_key: Some(Arc::from(PUBLISH_KEY)),
        };

        Self { state }
    }

    /// Returns an Axum Router wired to this server's state for `oneshot()` calls.
    pub fn router(&self) -> axum::Router {
        routes::router(self.state.clone())
    }

    /// Returns a reference to the underlying SQLite pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.state.db
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.state.gateway
    }

    /// Binds a TCP listener on port 0, spawns the server, and returns the base URL.
    pub async fn spawn(&self) -> String {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://127.0.0.1:{}", addr.port())
    }

    /// Create a user and issue it a bearer token.
    pub async fn create_user_with_token(&self, username: &str) -> TestUser {
        let user = db::users::create_user(
            self.pool(),
            &CreateUser {
                username: username.to_string(),
                display_name: None,
            },
        )
        .await
        .expect("failed to create test user");

        let token = db::auth::issue_token(self.pool(), &user.id)
            .await
            .expect("failed to issue test token");

        TestUser { user, token }
    }

    /// Create a room with a fixed id.
    pub async fn create_room(&self, room_id: &str, public: bool) {
        db::rooms::create_room(
            self.pool(),
            &CreateRoom {
                id: Some(room_id.to_string()),
                name: room_id.to_string(),
                public,
            },
        )
        .await
        .expect("failed to create test room");
    }

    /// Add a user as a member of a room.
    pub async fn add_member(&self, room_id: &str, user_id: &str) {
        db::rooms::add_member(self.pool(), room_id, user_id)
            .await
            .expect("failed to add test member");
    }
}

/// Build a request with an optional bearer token and JSON body.
pub fn request(
    method: Method,
    uri: &str,
    user: Option<&TestUser>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("Authorization", user.auth_header());
    }
    match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Build an operator request carrying the publish key.
pub fn operator_request(method: Method, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let mut req = request(method, uri, None, body);
    req.headers_mut()
        .insert("X-Publish-Key", PUBLISH_KEY.parse().unwrap());
    req
}

/// Read a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

/// Convenience: build a fresh test router backed by an isolated in-memory database.
pub async fn test_app() -> axum::Router {
    let server = TestServer::new().await;
    routes::router(server.state)
}
