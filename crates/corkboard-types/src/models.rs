use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Boards are identified by plain integers chosen by the client.
pub type BoardId = i64;

/// A positioned, colored text note on a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sticker {
    pub id: Uuid,
    pub board_id: BoardId,
    pub author_id: i64,
    pub x: i64,
    pub y: i64,
    pub text: String,
    pub color: i64,
    pub z_index: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
