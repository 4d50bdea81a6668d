mod auth;
mod health;
mod rooms;
mod users;
pub mod ws;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/ws/rooms/{room_id}", get(ws::ws_upgrade))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/version", get(health::version))
        .route("/auth/logout", post(auth::logout))
        // Users
        .route("/users", post(users::create_user))
        .route("/users/@me", get(users::get_current_user))
        .route("/users/@me/rooms", get(users::list_current_user_rooms))
        // Rooms
        .route("/rooms", post(rooms::create_room))
        .route("/rooms/{room_id}", get(rooms::get_room))
        .route(
            "/rooms/{room_id}/members/{username}",
            put(rooms::add_member).delete(rooms::remove_member),
        )
        .route("/rooms/{room_id}/messages", get(rooms::list_messages))
        .route("/rooms/{room_id}/presence", get(rooms::get_presence))
        // Bridge
        .route("/rooms/{room_id}/status", post(rooms::publish_status))
}
