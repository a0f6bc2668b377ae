use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

use corkboard_types::events::ServerEvent;
use corkboard_types::models::BoardId;

/// Identifies one live WebSocket connection.
pub type ConnId = Uuid;

/// Room name for a board, as it appears in logs.
pub fn room_name(board_id: BoardId) -> String {
    format!("board:{}", board_id)
}

/// A registered connection: its outbound queue and the boards it joined.
struct Member {
    tx: mpsc::UnboundedSender<ServerEvent>,
    boards: HashSet<BoardId>,
}

/// Tracks connected clients and their board rooms, and fans events out.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// conn_id -> member. Room membership lives on the member itself;
    /// a broadcast walks every member whose board set contains the room.
    members: RwLock<HashMap<ConnId, Member>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                members: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a new connection in the Unjoined state. Returns (conn_id, receiver).
    pub async fn register(&self) -> (ConnId, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.members.write().await.insert(
            conn_id,
            Member {
                tx,
                boards: HashSet::new(),
            },
        );
        (conn_id, rx)
    }

    /// Drop a connection and every room membership it held.
    pub async fn unregister(&self, conn_id: ConnId) {
        if let Some(member) = self.inner.members.write().await.remove(&conn_id) {
            debug!(
                "Connection {} left {} board room(s)",
                conn_id,
                member.boards.len()
            );
        }
    }

    /// Add a connection to a board room. Returns false if the connection is
    /// unknown (already disconnected).
    pub async fn join(&self, conn_id: ConnId, board_id: BoardId) -> bool {
        let mut members = self.inner.members.write().await;
        match members.get_mut(&conn_id) {
            Some(member) => {
                if member.boards.insert(board_id) {
                    info!("Connection {} joined {}", conn_id, room_name(board_id));
                }
                true
            }
            None => false,
        }
    }

    pub async fn is_member(&self, conn_id: ConnId, board_id: BoardId) -> bool {
        self.inner
            .members
            .read()
            .await
            .get(&conn_id)
            .is_some_and(|m| m.boards.contains(&board_id))
    }

    /// Boards a connection has joined, sorted.
    #[cfg(test)]
    pub(crate) async fn boards_of(&self, conn_id: ConnId) -> Vec<BoardId> {
        let members = self.inner.members.read().await;
        let mut boards: Vec<BoardId> = members
            .get(&conn_id)
            .map(|m| m.boards.iter().copied().collect())
            .unwrap_or_default();
        boards.sort_unstable();
        boards
    }

    /// Number of live connections in a board room.
    #[cfg(test)]
    pub(crate) async fn room_size(&self, board_id: BoardId) -> usize {
        self.inner
            .members
            .read()
            .await
            .values()
            .filter(|m| m.boards.contains(&board_id))
            .count()
    }

    /// Send an event to a single connection.
    pub async fn send_to(&self, conn_id: ConnId, event: ServerEvent) {
        let members = self.inner.members.read().await;
        if let Some(member) = members.get(&conn_id) {
            let _ = member.tx.send(event);
        }
    }

    /// Send an event to every member of a board room. Returns the number
    /// of connections it was queued for.
    pub async fn broadcast(&self, board_id: BoardId, event: ServerEvent) -> usize {
        let members = self.inner.members.read().await;
        let mut delivered = 0;
        for member in members.values().filter(|m| m.boards.contains(&board_id)) {
            if member.tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        debug!("Broadcast to {} reached {} connection(s)", room_name(board_id), delivered);
        delivered
    }
}
