//! Service layer: the operations the HTTP handlers call.
//!
//! [`Service`] maps missing rows to [`crate::error::AgentError::NotFound`]
//! and delegates audited writes to [`crate::controller::Controller`].

pub mod resource;

pub use resource::Service;
