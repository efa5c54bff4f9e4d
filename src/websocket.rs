use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::registry::PeerSender;
use crate::router;
use crate::AppState;

/// WebSocket upgrade handler
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One task per connection: a writer task drains the connection's outbound
/// channel while this loop feeds inbound frames to the router. The writer
/// ends on its own once the registry drops the last sender handle.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = state.registry.connect(PeerSender::new(tx)).await;

    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if ws_tx.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(err) => debug!("failed to encode outbound message: {err}"),
            }
        }
        debug!("writer task ended for connection {conn}");
    });

    debug!("connection {conn} accepted");

    while let Some(frame) = ws_rx.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                debug!("connection {conn} transport error: {err}");
                break;
            }
        };

        match frame {
            Message::Text(text) => {
                router::handle_frame(&state.registry, &state.blobs, conn, text.into_bytes()).await;
            }
            Message::Binary(data) => {
                router::handle_frame(&state.registry, &state.blobs, conn, data).await;
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    router::handle_close(&state.registry, conn).await;
    debug!("connection {conn} closed");
}
