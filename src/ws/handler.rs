//! WebSocket upgrade handler and per-connection session loop

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Client-generated player identity
    #[serde(rename = "playerId")]
    pub player_id: Uuid,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    info!(player_id = %query.player_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, query.player_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, player_id: Uuid, state: AppState) {
    info!(player_id = %player_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    // Place the player into a room before anything else; the
    // subscription covers every broadcast from that room.
    let (_handle, outbound_rx) = match state.rooms.join_room(player_id).await {
        Ok(pair) => pair,
        Err(e) => {
            error!(player_id = %player_id, error = %e, "Failed to place player in a room");
            return;
        }
    };

    run_session(player_id, ws_sink, ws_stream, &state, outbound_rx).await;

    // Cleanup on disconnect
    state.rooms.leave_room(player_id).await;

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: Uuid,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    mut outbound_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = PlayerRateLimiter::new();

    // Writer task: room broadcasts -> socket
    let writer_player_id = player_id;
    let writer_handle = tokio::spawn(async move {
        loop {
            match outbound_rx.recv().await {
                Ok(msg) => {
                    if ws_sink.send(Message::Text(msg.encode())).await.is_err() {
                        debug!(player_id = %writer_player_id, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Slow clients skip snapshots instead of dropping
                    warn!(
                        player_id = %writer_player_id,
                        lagged_count = n,
                        "Client lagged, skipping {} messages", n
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(player_id = %writer_player_id, "Room channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: socket -> room
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited input message");
                    continue;
                }

                match ClientMsg::decode(&text) {
                    Ok(ClientMsg::Leave(_)) => {
                        info!(player_id = %player_id, "Client requested leave");
                        break;
                    }
                    // Placement already happened at upgrade time
                    Ok(ClientMsg::Join(_)) => {
                        debug!(player_id = %player_id, "Redundant join ignored");
                    }
                    Ok(msg) => {
                        if state.rooms.forward(player_id, msg).await.is_err() {
                            debug!(player_id = %player_id, "Room channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}
