//! WebSocket layer: per-clinic client registry and message queue.
//!
//! Clients connect to `/ws/{clinic_id}`, receive their connection id and
//! must present a token before anything else is accepted.

pub mod connection;
pub mod handler;
pub mod manager;
pub mod messages;

pub use manager::{ClientConnection, ConnectionManager};
pub use messages::{Message, MessageType};
