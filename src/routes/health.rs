use axum::extract::State;
use axum::Json;

use crate::state::AppState;

pub async fn health() -> &'static str {
    "ok"
}

pub async fn version(State(state): State<AppState>) -> Json<serde_json::Value> {
    let registry = state.gateway.registry();
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "rooms": registry.room_count(),
    }))
}
