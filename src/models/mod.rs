pub mod room;
pub mod user;

use serde::Serialize;

/// Standard envelope for single-resource responses.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Standard envelope for paginated list responses.
#[derive(Debug, Serialize)]
pub struct ListResponse<T: Serialize> {
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

/// Paging for history, which walks backwards from the newest event.
#[derive(Debug, Serialize)]
pub struct Cursor {
    pub before: String,
    pub has_more: bool,
}
