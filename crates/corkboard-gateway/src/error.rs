use serde_json::Value;

use corkboard_db::StoreError;
use corkboard_types::events::ErrorPayload;
use corkboard_types::models::BoardId;

use crate::validation::ValidationError;

/// Why an inbound event was rejected. Every variant is terminal for the
/// event and is reported to the originating connection only.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("sticker not found")]
    NotFound,

    #[error("connection is not in board {board_id}")]
    NotInBoard { board_id: BoardId },

    #[error(transparent)]
    Store(StoreError),

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<StoreError> for GatewayError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => Self::NotFound,
            other => Self::Store(other),
        }
    }
}

impl GatewayError {
    /// Failures that are the server's fault rather than the client's.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Task(_))
    }

    /// Wire form of the error. Internal details never leave the server.
    pub fn to_payload(&self, request_id: Option<Value>) -> ErrorPayload {
        let mut payload = ErrorPayload {
            id: request_id,
            message: String::new(),
            code: None,
            board_id: None,
            errors: None,
        };

        match self {
            Self::Validation(e) => {
                payload.message = "Validation failed".into();
                payload.errors = Some(e.violations.clone());
            }
            Self::NotFound => {
                payload.message = "Sticker not found".into();
                payload.code = Some("NOT_FOUND".into());
            }
            Self::NotInBoard { board_id } => {
                payload.message = "Forbidden".into();
                payload.code = Some("NOT_IN_BOARD".into());
                payload.board_id = Some(*board_id);
            }
            Self::Store(_) | Self::Task(_) => {
                payload.message = "Internal server error".into();
            }
        }

        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn store_not_found_maps_to_not_found() {
        let err = GatewayError::from(StoreError::NotFound { id: "x".into() });
        assert!(matches!(err, GatewayError::NotFound));
        assert!(!err.is_internal());
    }

    #[test]
    fn not_in_board_carries_board_id() {
        let payload = GatewayError::NotInBoard { board_id: 4 }.to_payload(Some(json!(12)));
        assert_eq!(payload.id, Some(json!(12)));
        assert_eq!(payload.message, "Forbidden");
        assert_eq!(payload.code.as_deref(), Some("NOT_IN_BOARD"));
        assert_eq!(payload.board_id, Some(4));
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = GatewayError::from(StoreError::LockPoisoned);
        assert!(err.is_internal());
        let payload = err.to_payload(None);
        assert_eq!(payload.message, "Internal server error");
        assert!(payload.code.is_none() && payload.errors.is_none());
    }
}
