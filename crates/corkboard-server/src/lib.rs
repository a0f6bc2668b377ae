pub mod config;

use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use corkboard_db::Database;
use corkboard_gateway::board::BoardGateway;
use corkboard_gateway::connection;
use corkboard_gateway::dispatcher::Dispatcher;

use crate::config::Config;

#[derive(Clone)]
struct ServerState {
    gateway: Arc<BoardGateway>,
}

pub fn open_database(config: &Config) -> anyhow::Result<Database> {
    let db = if config.in_memory() {
        Database::open_in_memory()?
    } else {
        Database::open(&config.db_path)?
    };
    Ok(db)
}

/// Wire up the gateway over a database.
pub fn build_gateway(db: Database) -> Arc<BoardGateway> {
    Arc::new(BoardGateway::new(Arc::new(db), Dispatcher::new()))
}

/// The HTTP router: the board WebSocket namespace lives at `/board`.
pub fn app(gateway: Arc<BoardGateway>) -> Router {
    Router::new()
        .route("/board", get(ws_upgrade))
        .with_state(ServerState { gateway })
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn ws_upgrade(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, state.gateway))
}
