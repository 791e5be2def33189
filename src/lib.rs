//! # plus-db-agent
//!
//! Database lifecycle, data model and data-access layer shared by the
//! Plus clinic applications.
//!
//! A host application calls [`manager::init`] at startup and
//! [`manager::close`] at shutdown. In between, [`service::Service`]
//! (or the lower [`controller::Controller`] / [`repository::Repository`])
//! gives typed, filtered, audited access to every table.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler + ConnectionManager (ws/)
//!     │
//!     ├── Service (service/)          404 mapping
//!     ├── Controller (controller.rs)  audit log
//!     ├── Repository (repository/)    SQL via QueryBuilder
//!     │       └── ListFilter (filters/)
//!     │
//!     ├── Models (models/)
//!     └── PostgreSQL pool (manager.rs)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod controller;
pub mod error;
pub mod filters;
pub mod manager;
pub mod models;
pub mod repository;
pub mod service;
pub mod ws;

pub use error::AgentError;
pub use manager::{Database, close, init};
