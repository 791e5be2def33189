//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;

/// `GET /ws/{clinic_id}` — Upgrade HTTP connection to WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(clinic_id): Path<i64>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let manager = Arc::clone(&state.connections);
    if manager.start_queue_processor().await.is_some() {
        tracing::debug!("ws queue processor started on first upgrade");
    }
    ws.on_upgrade(move |socket| run_connection(socket, manager, clinic_id))
}
