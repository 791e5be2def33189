//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::manager::Database;
use crate::ws::ConnectionManager;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Connection pool handle.
    pub db: Database,
    /// Registry of websocket clients.
    pub connections: Arc<ConnectionManager>,
}

impl AppState {
    /// Builds the state around an initialized database.
    #[must_use]
    pub fn new(db: Database, ws_queue_capacity: usize) -> Self {
        Self {
            db,
            connections: Arc::new(ConnectionManager::new(ws_queue_capacity)),
        }
    }
}
