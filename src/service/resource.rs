//! Generic resource service: 404 mapping on top of the audited controller.

use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::controller::Controller;
use crate::error::AgentError;
use crate::filters::{Condition, ListFilter, Page, Pagination};
use crate::models::Model;

/// HTTP-facing operations on `M`.
///
/// Every lookup that finds nothing becomes [`AgentError::NotFound`],
/// which renders as a 404 naming the field that was searched.
#[derive(Debug)]
pub struct Service<M> {
    controller: Controller<M>,
}

impl<M> Clone for Service<M> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
        }
    }
}

impl<M: Model> Service<M> {
    /// Creates a service whose audit entries name `module`.
    #[must_use]
    pub fn new(pool: PgPool, module: &'static str) -> Self {
        Self {
            controller: Controller::new(pool, module),
        }
    }

    /// Wrapped controller.
    #[must_use]
    pub fn controller(&self) -> &Controller<M> {
        &self.controller
    }

    /// Fetches a row by primary key.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotFound`] on field `id` when missing.
    pub async fn get_obj_or_404(&self, pk: i64) -> Result<M, AgentError> {
        self.controller
            .get_obj_or_none(pk)
            .await?
            .ok_or_else(|| AgentError::not_found("id"))
    }

    /// Lists every row matching `filter`, soft-deleted rows included.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Database`] on query failure.
    pub async fn list(&self, filter: &ListFilter<M>) -> Result<Vec<M>, AgentError> {
        self.controller.list(filter).await
    }

    /// One page of live (`deleted = false`) rows matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Database`] on query failure.
    pub async fn paginated_list(
        &self,
        filter: &ListFilter<M>,
        pagination: Pagination,
    ) -> Result<Page<M>, AgentError> {
        let live = Condition::eq::<M>("deleted", Value::Bool(false))?;
        self.controller.paginate(filter, vec![live], pagination).await
    }

    /// Creates a row.
    ///
    /// # Errors
    ///
    /// See [`Controller::add`].
    pub async fn add(
        &self,
        record: &Map<String, Value>,
        user_id: Option<i64>,
    ) -> Result<M, AgentError> {
        self.controller.add(record, user_id).await
    }

    /// Updates a row.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotFound`] when `pk` does not exist.
    pub async fn update(
        &self,
        record: &Map<String, Value>,
        pk: i64,
        user_id: Option<i64>,
    ) -> Result<M, AgentError> {
        self.controller
            .update(record, pk, user_id)
            .await?
            .ok_or_else(|| AgentError::not_found("id"))
    }

    /// Removes a row permanently.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotFound`] when `pk` does not exist.
    pub async fn delete(&self, pk: i64, user_id: Option<i64>) -> Result<(), AgentError> {
        if self.controller.delete(pk, user_id).await? {
            Ok(())
        } else {
            Err(AgentError::not_found("id"))
        }
    }

    /// Flags a row as deleted.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotFound`] when `pk` does not exist.
    pub async fn soft_delete(&self, pk: i64, user_id: Option<i64>) -> Result<(), AgentError> {
        self.controller
            .soft_delete(pk, user_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AgentError::not_found("id"))
    }

    /// Fetches the first row whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotFound`] on `field` when missing.
    pub async fn get_by_field(&self, field: &str, value: Value) -> Result<M, AgentError> {
        self.controller
            .get_by_field(field, value)
            .await?
            .ok_or_else(|| AgentError::not_found(field))
    }
}
