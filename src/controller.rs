//! Audited mutations.
//!
//! [`Controller`] wraps a [`Repository`] and records a [`Log`] row after
//! every create, update and delete. A failed audit write never fails the
//! mutation that triggered it.

use std::fmt;

use chrono::Utc;
use serde_json::{Map, Value, json};
use sqlx::PgPool;

use crate::error::AgentError;
use crate::filters::{Condition, ListFilter, Page, Pagination};
use crate::models::{Log, Model};
use crate::repository::Repository;

/// Operation recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOperation {
    /// Row inserted.
    Create,
    /// Row updated.
    Update,
    /// Row flagged as deleted.
    SoftDelete,
    /// Row removed from the table.
    HardDelete,
}

impl AuditOperation {
    /// Label stored in `logs.operation`.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Create => "Criação",
            Self::Update => "Atualização",
            Self::SoftDelete => "Exclusão",
            Self::HardDelete => "Exclusão permanente",
        }
    }
}

impl fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Repository access for `M` with audit logging.
#[derive(Debug)]
pub struct Controller<M> {
    repository: Repository<M>,
    logs: Repository<Log>,
    module: &'static str,
}

impl<M> Clone for Controller<M> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            logs: self.logs.clone(),
            module: self.module,
        }
    }
}

impl<M: Model> Controller<M> {
    /// Creates a controller whose log entries name `module`.
    #[must_use]
    pub fn new(pool: PgPool, module: &'static str) -> Self {
        Self {
            repository: Repository::new(pool.clone()),
            logs: Repository::new(pool),
            module,
        }
    }

    /// Wrapped repository.
    #[must_use]
    pub fn repository(&self) -> &Repository<M> {
        &self.repository
    }

    /// Module name written to the audit log.
    #[must_use]
    pub fn module(&self) -> &'static str {
        self.module
    }

    /// Writes an audit entry. Returns `false` when the write failed.
    pub async fn set_log(
        &self,
        operation: AuditOperation,
        identifier: Option<i64>,
        user_id: Option<i64>,
    ) -> bool {
        let record = log_record(self.module, M::NAME, operation, identifier, user_id);
        match self.logs.add(&record).await {
            Ok(_) => true,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    module = self.module,
                    model = M::NAME,
                    operation = %operation,
                    "error setting log"
                );
                false
            }
        }
    }

    /// Fetches a row by primary key.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Database`] on query failure.
    pub async fn get_obj_or_none(&self, pk: i64) -> Result<Option<M>, AgentError> {
        self.repository.get_by_id(pk).await
    }

    /// Lists rows matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Database`] on query failure.
    pub async fn list(&self, filter: &ListFilter<M>) -> Result<Vec<M>, AgentError> {
        self.repository.list(filter).await
    }

    /// One page of rows matching `filter` and `base`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Database`] on query failure.
    pub async fn paginate(
        &self,
        filter: &ListFilter<M>,
        base: Vec<Condition>,
        pagination: Pagination,
    ) -> Result<Page<M>, AgentError> {
        self.repository.paginate(filter, base, pagination).await
    }

    /// Inserts a row and logs the creation.
    ///
    /// # Errors
    ///
    /// See [`Repository::add`].
    pub async fn add(
        &self,
        record: &Map<String, Value>,
        user_id: Option<i64>,
    ) -> Result<M, AgentError> {
        let created = self.repository.add(record).await?;
        self.set_log(AuditOperation::Create, Some(created.id()), user_id)
            .await;
        Ok(created)
    }

    /// Updates a row and logs the change. `None` when `pk` does not exist.
    ///
    /// # Errors
    ///
    /// See [`Repository::update`].
    pub async fn update(
        &self,
        record: &Map<String, Value>,
        pk: i64,
        user_id: Option<i64>,
    ) -> Result<Option<M>, AgentError> {
        let Some(updated) = self.repository.update(record, pk).await? else {
            return Ok(None);
        };
        self.set_log(AuditOperation::Update, Some(updated.id()), user_id)
            .await;
        Ok(Some(updated))
    }

    /// Removes a row permanently. The log entry carries no identifier.
    ///
    /// # Errors
    ///
    /// See [`Repository::delete`].
    pub async fn delete(&self, pk: i64, user_id: Option<i64>) -> Result<bool, AgentError> {
        let removed = self.repository.delete(pk).await?;
        if removed {
            self.set_log(AuditOperation::HardDelete, None, user_id).await;
        }
        Ok(removed)
    }

    /// Flags a row as deleted. `None` when `pk` does not exist.
    ///
    /// # Errors
    ///
    /// See [`Repository::update`].
    pub async fn soft_delete(&self, pk: i64, user_id: Option<i64>) -> Result<Option<M>, AgentError> {
        let record = Map::from_iter([("deleted".to_string(), Value::Bool(true))]);
        let Some(updated) = self.repository.update(&record, pk).await? else {
            return Ok(None);
        };
        self.set_log(AuditOperation::SoftDelete, Some(updated.id()), user_id)
            .await;
        Ok(Some(updated))
    }

    /// Fetches the first row whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// See [`Repository::get_by_field`].
    pub async fn get_by_field(&self, field: &str, value: Value) -> Result<Option<M>, AgentError> {
        self.repository.get_by_field(field, value).await
    }
}

fn log_record(
    module: &str,
    model: &str,
    operation: AuditOperation,
    identifier: Option<i64>,
    user_id: Option<i64>,
) -> Map<String, Value> {
    let value = json!({
        "user_id": user_id,
        "module": module,
        "model": model,
        "operation": operation.label(),
        "identifier": identifier,
        "logged_in": Utc::now().to_rfc3339(),
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::models::Desk;
    use crate::repository::insert_query;

    #[test]
    fn labels_match_stored_values() {
        assert_eq!(AuditOperation::Create.label(), "Criação");
        assert_eq!(AuditOperation::Update.label(), "Atualização");
        assert_eq!(AuditOperation::SoftDelete.label(), "Exclusão");
        assert_eq!(AuditOperation::HardDelete.to_string(), "Exclusão permanente");
    }

    #[test]
    fn hard_delete_log_has_no_identifier() {
        let record = log_record("clinic", Desk::NAME, AuditOperation::HardDelete, None, Some(7));
        assert_eq!(record.get("identifier"), Some(&Value::Null));
        assert_eq!(record.get("user_id"), Some(&json!(7)));
        assert_eq!(record.get("model"), Some(&json!("DeskModel")));
    }

    #[test]
    fn log_record_fits_the_log_table() {
        let record = log_record("clinic", Desk::NAME, AuditOperation::Create, Some(3), None);
        let Ok(builder) = insert_query::<Log>(&record) else {
            panic!("log record should be insertable");
        };
        assert!(builder.sql().starts_with("INSERT INTO \"logs\" (\"identifier\", \"logged_in\""));
    }

    type LogRow = (Option<i64>, String, String, String, Option<i64>);

    async fn last_log(pool: &PgPool, model: &str, identifier: i64) -> Option<LogRow> {
        sqlx::query_as::<_, LogRow>(
            "SELECT user_id, module, model, operation, identifier FROM logs \
             WHERE model = $1 AND identifier = $2 ORDER BY id DESC LIMIT 1",
        )
        .bind(model)
        .bind(identifier)
        .fetch_optional(pool)
        .await
        .ok()
        .flatten()
    }

    fn desk_record(number: &str) -> Map<String, Value> {
        let Value::Object(map) = json!({ "number": number }) else {
            panic!("expected object");
        };
        map
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn mutations_write_audit_rows() {
        let pool = crate::manager::test_pool().await;
        let desks = Controller::<Desk>::new(pool.clone(), "clinic");

        let Ok(created) = desks.add(&desk_record("D-901"), None).await else {
            panic!("insert failed");
        };
        let Some(entry) = last_log(&pool, Desk::NAME, created.id()).await else {
            panic!("creation was not logged");
        };
        assert_eq!(
            entry,
            (
                None,
                "clinic".to_string(),
                "DeskModel".to_string(),
                "Criação".to_string(),
                Some(created.id())
            )
        );

        let Ok(Some(_)) = desks.soft_delete(created.id(), None).await else {
            panic!("soft delete failed");
        };
        let Some((_, _, _, operation, _)) = last_log(&pool, Desk::NAME, created.id()).await else {
            panic!("soft delete was not logged");
        };
        assert_eq!(operation, "Exclusão");
        assert!(matches!(desks.delete(created.id(), None).await, Ok(true)));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn failed_audit_write_keeps_the_mutation() {
        let pool = crate::manager::test_pool().await;
        let desks = Controller::<Desk>::new(pool.clone(), "clinic");
        let missing_user = Some(-1);

        assert!(!desks.set_log(AuditOperation::Create, Some(1), missing_user).await);

        let Ok(created) = desks.add(&desk_record("D-902"), missing_user).await else {
            panic!("mutation must survive a failed audit write");
        };
        assert!(last_log(&pool, Desk::NAME, created.id()).await.is_none());
        assert!(matches!(desks.delete(created.id(), None).await, Ok(true)));
    }
}
