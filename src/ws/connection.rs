//! Read/write loop for a single websocket client.

use std::sync::Arc;

use axum::extract::ws::{Message as Frame, WebSocket};
use futures_util::{SinkExt, StreamExt};

use super::manager::{ConnectionManager, Outbound};

/// Registers the socket with `manager` and runs until either side closes.
///
/// - Text frames from the client are handed to [`ConnectionManager::receive`].
/// - Frames queued for this client are written as they arrive.
pub async fn run_connection(socket: WebSocket, manager: Arc<ConnectionManager>, clinic_id: i64) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (client, mut outbound) = manager.register(clinic_id).await;
    let uuid = client.uuid;

    loop {
        tokio::select! {
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Frame::Text(text))) => manager.receive(&uuid, text.as_str()).await,
                    Some(Ok(Frame::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(%uuid, error = %err, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
            out = outbound.recv() => {
                match out {
                    Some(Outbound::Message(msg)) => {
                        if ws_tx.send(Frame::text(msg.to_json())).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close) | None => {
                        let _ = ws_tx.send(Frame::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    manager.disconnect(&uuid).await;
    tracing::debug!(%uuid, "ws connection closed");
}
