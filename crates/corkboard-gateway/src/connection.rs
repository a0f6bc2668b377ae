use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use corkboard_types::events::ClientFrame;

use crate::board::BoardGateway;
use crate::dispatcher::ConnId;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Drive one WebSocket connection until either side goes away.
///
/// Inbound frames are handled one at a time, in order. Outbound events
/// (replies and room broadcasts) are drained from the connection's queue by
/// a separate task, so a slow client never blocks other connections.
pub async fn handle_connection(socket: WebSocket, gateway: Arc<BoardGateway>) {
    serve_connection(socket, gateway, HEARTBEAT_INTERVAL).await
}

pub(crate) async fn serve_connection(
    socket: WebSocket,
    gateway: Arc<BoardGateway>,
    heartbeat_interval: Duration,
) {
    let (mut sender, mut receiver) = socket.split();

    let dispatcher = gateway.dispatcher().clone();
    let (conn_id, mut outbound_rx) = dispatcher.register().await;
    info!("Connection {} opened", conn_id);

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward queued events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(heartbeat_interval);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = outbound_rx.recv() => {
                    let Some(event) = event else { break };

                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Failed to encode outbound event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read events from client
    let recv_gateway = gateway.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(frame) => {
                        debug!("{} -> {}", conn_id, frame.event);
                        handle_detached(recv_gateway.clone(), conn_id, frame).await;
                    }
                    Err(e) => {
                        let raw: String = text.chars().take(200).collect();
                        warn!("{} bad frame: {} -- raw: {}", conn_id, e, raw);
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister(conn_id).await;
    info!("Connection {} closed", conn_id);
}

/// Handle one frame on its own task and wait for it. Aborting the caller
/// leaves the handler running, so a committed mutation is still broadcast.
async fn handle_detached(gateway: Arc<BoardGateway>, conn_id: ConnId, frame: ClientFrame) {
    let event = frame.event.clone();
    let handler = tokio::spawn(async move { gateway.handle_frame(conn_id, frame).await });
    if let Err(e) = handler.await {
        error!("{} handler for {} failed: {}", conn_id, event, e);
    }
}
