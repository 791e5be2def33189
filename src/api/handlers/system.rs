//! System endpoints: health check.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::app_state::AppState;

const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Connection pool figures reported by `/health`.
#[derive(Debug, Serialize)]
struct PoolStatus {
    reachable: bool,
    closed: bool,
    size: u32,
    idle: usize,
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    version: String,
    database: PoolStatus,
    ws_connections: usize,
}

/// `GET /health` — Service and connection pool status.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let pool = state.db.pool();
    let reachable = !pool.is_closed()
        && matches!(
            tokio::time::timeout(PING_TIMEOUT, sqlx::query("SELECT 1").execute(pool)).await,
            Ok(Ok(_))
        );

    let response = HealthResponse {
        status: if reachable { "healthy" } else { "degraded" },
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: PoolStatus {
            reachable,
            closed: pool.is_closed(),
            size: pool.size(),
            idle: pool.num_idle(),
        },
        ws_connections: state.connections.get_all_connections().await.len(),
    };
    (StatusCode::OK, Json(response))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
