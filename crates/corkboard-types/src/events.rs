use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{BoardId, Sticker};

pub const JOIN_BOARD: &str = "join_board";
pub const CREATE_STICKER: &str = "create_sticker";
pub const UPDATE_STICKER: &str = "update_sticker";
pub const DELETE_STICKER: &str = "delete_sticker";

/// A raw frame sent FROM client TO server. `data` is validated against the
/// schema registered for `event` before it is decoded into a command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
    /// Optional request id. When present the server answers with an `ack`
    /// (or an `exception`) carrying the same id. Opaque: any JSON value is
    /// echoed back as sent, `null` counts as absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
}

// -- Commands --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JoinBoard {
    pub board_id: BoardId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateSticker {
    pub board_id: BoardId,
    pub author_id: i64,
    pub x: i64,
    pub y: i64,
    pub text: String,
    #[serde(default)]
    pub color: Option<i64>,
    #[serde(default)]
    pub z_index: Option<i64>,
}

/// Partial update: only the fields that are `Some` change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateSticker {
    pub id: Uuid,
    #[serde(default)]
    pub x: Option<i64>,
    #[serde(default)]
    pub y: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub color: Option<i64>,
    #[serde(default)]
    pub z_index: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeleteSticker {
    pub id: Uuid,
}

// -- Server events --

/// Events sent FROM server TO clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Full board contents, sent only to the connection that joined
    BoardState {
        board_id: BoardId,
        stickers: Vec<Sticker>,
    },

    StickerCreated { board_id: BoardId, sticker: Sticker },

    StickerUpdated { board_id: BoardId, sticker: Sticker },

    StickerDeleted { board_id: BoardId, id: Uuid },

    /// Reply to a client frame that carried a request id
    Ack {
        id: serde_json::Value,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sticker: Option<Sticker>,
    },

    /// A rejected event. Never broadcast.
    Exception(ErrorPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<BoardId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldViolation>>,
}

/// One schema violation. Field names follow the JSON Schema error shape
/// clients already know how to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldViolation {
    pub instance_path: String,
    pub keyword: String,
    pub message: String,
    #[serde(default)]
    pub params: serde_json::Value,
}
