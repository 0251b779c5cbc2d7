use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::api::AppState;
use super::models::{Board, Card};
use crate::reorder::PositionUpdate;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── Event types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BoardEvent {
    BoardCreated {
        board: Board,
        at: DateTime<Utc>,
    },
    CardCreated {
        card: Card,
        at: DateTime<Utc>,
    },
    CardDeleted {
        board_id: i64,
        card_id: i64,
        at: DateTime<Utc>,
    },
    PositionsChanged {
        board_id: i64,
        positions: Vec<PositionUpdate<i64>>,
        at: DateTime<Utc>,
    },
}

impl BoardEvent {
    pub fn board_created(board: Board) -> Self {
        Self::BoardCreated { board, at: Utc::now() }
    }

    pub fn card_created(card: Card) -> Self {
        Self::CardCreated { card, at: Utc::now() }
    }

    pub fn card_deleted(board_id: i64, card_id: i64) -> Self {
        Self::CardDeleted {
            board_id,
            card_id,
            at: Utc::now(),
        }
    }

    pub fn positions_changed(board_id: i64, positions: Vec<PositionUpdate<i64>>) -> Self {
        Self::PositionsChanged {
            board_id,
            positions,
            at: Utc::now(),
        }
    }
}

// ── WebSocket handler ────────────────────────────────────────────────

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();
    let rx = state.events_tx.subscribe();
    tracing::debug!("websocket subscriber connected");
    run_socket_loop(sender, receiver, rx).await;
    tracing::debug!("websocket subscriber disconnected");
}

/// Forward board events to one client with ping/pong keepalive.
///
/// If no Pong arrives within [`PONG_TIMEOUT`] after a Ping the connection is
/// treated as dead and the loop exits.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<String>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // First tick completes immediately.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    tracing::debug!("websocket pong timeout");
                    break;
                }
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "websocket subscriber lagged");
                        continue;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

// ── Broadcast helper ─────────────────────────────────────────────────

/// Serialize and broadcast an event to all connected clients.
/// Returns silently if nobody is listening.
pub fn broadcast_event(tx: &broadcast::Sender<String>, event: &BoardEvent) {
    match serde_json::to_string(event) {
        Ok(json) => {
            let _ = tx.send(json);
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize board event");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
