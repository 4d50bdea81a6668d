use std::sync::Arc;

use sqlx::SqlitePool;

use crate::gateway::Gateway;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub gateway: Arc<Gateway>,
    pub publish_key: Option<Arc<str>>,
}
