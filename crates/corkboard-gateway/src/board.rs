//! Board gateway: routes validated board events to their handlers.
//!
//! Events: `join_board`, `create_sticker`, `update_sticker`, `delete_sticker`.
//! Mutations require the connection to have joined the sticker's board room.
//! For update/delete the room is taken from the stored sticker, never from
//! the request. Results are broadcast to the room; errors go back to the
//! sender only.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use corkboard_db::Database;
use corkboard_types::events::{
    CREATE_STICKER, ClientFrame, CreateSticker, DELETE_STICKER, DeleteSticker, JOIN_BOARD,
    JoinBoard, ServerEvent, UPDATE_STICKER, UpdateSticker,
};
use corkboard_types::models::{BoardId, Sticker};

use crate::dispatcher::{ConnId, Dispatcher, room_name};
use crate::error::GatewayError;
use crate::validation::SchemaRegistry;

/// What the sender gets back besides any broadcast.
#[derive(Debug)]
enum Outcome {
    /// No acknowledgement (join answers with `board_state` instead)
    Silent,
    Ack(Option<Sticker>),
}

pub struct BoardGateway {
    db: Arc<Database>,
    dispatcher: Dispatcher,
    schemas: SchemaRegistry,
}

impl BoardGateway {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher) -> Self {
        Self {
            db,
            dispatcher,
            schemas: SchemaRegistry::new(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle one inbound frame to completion, including the reply to the
    /// sender.
    pub async fn handle_frame(&self, conn_id: ConnId, frame: ClientFrame) {
        let ClientFrame { event, data, id } = frame;

        match self.dispatch(conn_id, &event, data).await {
            Ok(Outcome::Silent) => {}
            Ok(Outcome::Ack(sticker)) => {
                if let Some(id) = id {
                    self.dispatcher
                        .send_to(conn_id, ServerEvent::Ack { id, ok: true, sticker })
                        .await;
                }
            }
            Err(err) => {
                if err.is_internal() {
                    error!("{} from {} failed: {}", event, conn_id, err);
                } else {
                    info!("{} from {} rejected: {}", event, conn_id, err);
                }
                self.dispatcher
                    .send_to(conn_id, ServerEvent::Exception(err.to_payload(id)))
                    .await;
            }
        }
    }

    async fn dispatch(
        &self,
        conn_id: ConnId,
        event: &str,
        data: Value,
    ) -> Result<Outcome, GatewayError> {
        let outcome = match event {
            JOIN_BOARD => {
                self.join_board(conn_id, self.schemas.decode(event, data)?)
                    .await?;
                Outcome::Silent
            }
            CREATE_STICKER => {
                let sticker = self
                    .create_sticker(conn_id, self.schemas.decode(event, data)?)
                    .await?;
                Outcome::Ack(Some(sticker))
            }
            UPDATE_STICKER => {
                let sticker = self
                    .update_sticker(conn_id, self.schemas.decode(event, data)?)
                    .await?;
                Outcome::Ack(Some(sticker))
            }
            DELETE_STICKER => {
                self.delete_sticker(conn_id, self.schemas.decode(event, data)?)
                    .await?;
                Outcome::Ack(None)
            }
            other => {
                warn!("{} sent unknown event '{}', ignoring", conn_id, other);
                Outcome::Silent
            }
        };
        Ok(outcome)
    }

    /// Join the board room and send the board's stickers to the joiner.
    pub async fn join_board(&self, conn_id: ConnId, dto: JoinBoard) -> Result<(), GatewayError> {
        let board_id = dto.board_id;
        if !self.dispatcher.join(conn_id, board_id).await {
            debug!("{} is gone, skipping join of {}", conn_id, room_name(board_id));
            return Ok(());
        }

        let stickers = self.run_db(move |db| db.list_stickers(board_id)).await?;

        self.dispatcher
            .send_to(conn_id, ServerEvent::BoardState { board_id, stickers })
            .await;
        Ok(())
    }

    pub async fn create_sticker(
        &self,
        conn_id: ConnId,
        dto: CreateSticker,
    ) -> Result<Sticker, GatewayError> {
        let board_id = dto.board_id;
        self.ensure_in_board(conn_id, board_id).await?;

        let now = Utc::now();
        let sticker = self.run_db(move |db| db.create_sticker(&dto, now)).await?;
        info!("Sticker {} created in {}", sticker.id, room_name(board_id));

        self.dispatcher
            .broadcast(
                board_id,
                ServerEvent::StickerCreated {
                    board_id,
                    sticker: sticker.clone(),
                },
            )
            .await;
        Ok(sticker)
    }

    pub async fn update_sticker(
        &self,
        conn_id: ConnId,
        dto: UpdateSticker,
    ) -> Result<Sticker, GatewayError> {
        let existing = self.find_sticker(dto.id).await?;
        self.ensure_in_board(conn_id, existing.board_id).await?;

        let now = Utc::now();
        let sticker = self.run_db(move |db| db.update_sticker(&dto, now)).await?;
        let board_id = sticker.board_id;

        self.dispatcher
            .broadcast(
                board_id,
                ServerEvent::StickerUpdated {
                    board_id,
                    sticker: sticker.clone(),
                },
            )
            .await;
        Ok(sticker)
    }

    pub async fn delete_sticker(
        &self,
        conn_id: ConnId,
        dto: DeleteSticker,
    ) -> Result<(), GatewayError> {
        let existing = self.find_sticker(dto.id).await?;
        let board_id = existing.board_id;
        self.ensure_in_board(conn_id, board_id).await?;

        let id = self.run_db(move |db| db.delete_sticker(dto.id)).await?;
        info!("Sticker {} deleted from {}", id, room_name(board_id));

        self.dispatcher
            .broadcast(board_id, ServerEvent::StickerDeleted { board_id, id })
            .await;
        Ok(())
    }

    async fn find_sticker(&self, id: Uuid) -> Result<Sticker, GatewayError> {
        self.run_db(move |db| db.get_sticker(id))
            .await?
            .ok_or(GatewayError::NotFound)
    }

    async fn ensure_in_board(&self, conn_id: ConnId, board_id: BoardId) -> Result<(), GatewayError> {
        if self.dispatcher.is_member(conn_id, board_id).await {
            Ok(())
        } else {
            Err(GatewayError::NotInBoard { board_id })
        }
    }

    /// Run a blocking DB call off the async runtime.
    async fn run_db<F, T>(&self, f: F) -> Result<T, GatewayError>
    where
        F: FnOnce(&Database) -> corkboard_db::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        Ok(tokio::task::spawn_blocking(move || f(&db)).await??)
    }
}
