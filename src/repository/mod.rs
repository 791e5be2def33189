//! Generic table access.
//!
//! [`Repository`] turns JSON records and [`ListFilter`]s into SQL for any
//! [`Model`]. Column names come from the model descriptors and are always
//! quoted; values are always bound.

pub mod links;

use std::marker::PhantomData;

use serde_json::{Map, Value};
use sqlx::{PgPool, Postgres, QueryBuilder};

pub use links::{LinkTable, PLANS_SPECIALTIES, PROFILES_PERMISSIONS};

use crate::error::AgentError;
use crate::filters::{Condition, ListFilter, OrderTerm, Page, Pagination, SqlValue, quote_ident};
use crate::models::{Field, Model};

/// CRUD access to the table of `M`.
#[derive(Debug)]
pub struct Repository<M> {
    pool: PgPool,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for Repository<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> Repository<M> {
    /// Creates a repository over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _model: PhantomData,
        }
    }

    /// Underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Fetches a row by primary key.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Database`] on query failure.
    pub async fn get_by_id(&self, pk: i64) -> Result<Option<M>, AgentError> {
        let mut builder = select_from::<M>();
        builder.push(" WHERE \"id\" = ");
        builder.push_bind(pk);
        let row = builder.build_query_as::<M>().fetch_optional(&self.pool).await?;
        Ok(row)
    }

    /// Lists rows matching `filter`, newest first unless an ordering was
    /// requested.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Database`] on query failure.
    pub async fn list(&self, filter: &ListFilter<M>) -> Result<Vec<M>, AgentError> {
        let mut builder = select_query(filter);
        let rows = builder.build_query_as::<M>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Inserts a row from a JSON object and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidRequest`] for unknown keys or values
    /// that do not fit their column, [`AgentError::Conflict`] on
    /// constraint violations.
    pub async fn add(&self, record: &Map<String, Value>) -> Result<M, AgentError> {
        let mut builder = insert_query::<M>(record)?;
        let row = builder.build_query_as::<M>().fetch_one(&self.pool).await?;
        tracing::debug!(table = M::TABLE, id = row.id(), "row inserted");
        Ok(row)
    }

    /// Updates the row `pk` with every non-null key of `record`.
    ///
    /// Returns `None` when no such row exists.
    ///
    /// # Errors
    ///
    /// See [`Repository::add`].
    pub async fn update(
        &self,
        record: &Map<String, Value>,
        pk: i64,
    ) -> Result<Option<M>, AgentError> {
        let mut builder = update_query::<M>(record, pk)?;
        let row = builder.build_query_as::<M>().fetch_optional(&self.pool).await?;
        Ok(row)
    }

    /// Permanently deletes the row `pk`. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Conflict`] when other rows still reference it.
    pub async fn delete(&self, pk: i64) -> Result<bool, AgentError> {
        let mut builder = QueryBuilder::<Postgres>::new("DELETE FROM ");
        builder.push(quote_ident(M::TABLE));
        builder.push(" WHERE \"id\" = ");
        builder.push_bind(pk);
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fetches the first row whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidFilter`] for an unknown field.
    pub async fn get_by_field(&self, field: &str, value: Value) -> Result<Option<M>, AgentError> {
        let filter = ListFilter::<M>::new().with(field, value)?;
        self.first(&filter).await
    }

    /// Fetches the first row matching `filter` in default order.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Database`] on query failure.
    pub async fn first(&self, filter: &ListFilter<M>) -> Result<Option<M>, AgentError> {
        let mut builder = select_query(filter);
        builder.push(" LIMIT 1");
        let row = builder.build_query_as::<M>().fetch_optional(&self.pool).await?;
        Ok(row)
    }

    /// Returns the row matching `lookup`, inserting `lookup` merged with
    /// `defaults` when there is none. The flag is `true` when a row was
    /// created.
    ///
    /// # Errors
    ///
    /// See [`Repository::add`].
    pub async fn get_or_create(
        &self,
        lookup: &Map<String, Value>,
        defaults: &Map<String, Value>,
    ) -> Result<(M, bool), AgentError> {
        let filter = ListFilter::<M>::from_record(lookup)?;
        if let Some(row) = self.first(&filter).await? {
            return Ok((row, false));
        }

        let mut record = lookup.clone();
        record.extend(defaults.iter().map(|(k, v)| (k.clone(), v.clone())));
        match self.add(&record).await {
            Ok(row) => Ok((row, true)),
            // Lost a race against a concurrent insert of the same key.
            Err(AgentError::Conflict(msg)) => match self.first(&filter).await? {
                Some(row) => Ok((row, false)),
                None => Err(AgentError::Conflict(msg)),
            },
            Err(err) => Err(err),
        }
    }

    /// Returns one page of rows matching `filter` and every `base`
    /// condition, with the total match count.
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
        let filter = base.into_iter().fold(filter.clone(), ListFilter::and);
        let pagination = pagination.clamped();

        let mut count = count_query(&filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = select_query(&filter);
        select.push(" LIMIT ");
        select.push_bind(pagination.limit());
        select.push(" OFFSET ");
        select.push_bind(pagination.offset());
        let items = select.build_query_as::<M>().fetch_all(&self.pool).await?;

        Ok(Page::new(
            items,
            u64::try_from(total).unwrap_or_default(),
            pagination,
        ))
    }
}

fn select_from<M: Model>() -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT * FROM ");
    builder.push(quote_ident(M::TABLE));
    builder
}

/// `SELECT *` with the filter's predicates and ordering.
#[must_use]
pub fn select_query<M: Model>(filter: &ListFilter<M>) -> QueryBuilder<'static, Postgres> {
    let mut builder = select_from::<M>();
    filter.push_where(&mut builder);
    filter.push_order_by(&mut builder, &[OrderTerm::NEWEST_FIRST]);
    builder
}

/// `SELECT COUNT(*)` with the filter's predicates.
#[must_use]
pub fn count_query<M: Model>(filter: &ListFilter<M>) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM ");
    builder.push(quote_ident(M::TABLE));
    filter.push_where(&mut builder);
    builder
}

/// `INSERT ... RETURNING *` for a JSON record.
///
/// # Errors
///
/// Returns [`AgentError::InvalidRequest`] for unknown keys, bad values or
/// a missing column that has neither a default nor `NULL`.
pub fn insert_query<M: Model>(
    record: &Map<String, Value>,
) -> Result<QueryBuilder<'static, Postgres>, AgentError> {
    let mut columns = Vec::new();
    for (key, value) in record {
        let field = known_field::<M>(key)?;
        if !field.is_writable() {
            continue;
        }
        columns.push((field, SqlValue::coerce(field, value)?));
    }
    if let Some(missing) = M::FIELDS
        .iter()
        .find(|f| f.is_required() && !record.contains_key(f.name))
    {
        return Err(AgentError::InvalidRequest(format!(
            "{}: this field is required",
            missing.name
        )));
    }

    let mut builder = QueryBuilder::new("INSERT INTO ");
    builder.push(quote_ident(M::TABLE));
    if columns.is_empty() {
        builder.push(" DEFAULT VALUES RETURNING *");
        return Ok(builder);
    }

    builder.push(" (");
    for (i, (field, _)) in columns.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push(quote_ident(field.name));
    }
    builder.push(") VALUES (");
    for (i, (_, value)) in columns.into_iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        value.push_bind(&mut builder);
    }
    builder.push(") RETURNING *");
    Ok(builder)
}

/// `UPDATE ... RETURNING *` for a JSON record. Null values, `id` and the
/// timestamps are skipped; `updated_at` is always bumped.
///
/// # Errors
///
/// Returns [`AgentError::InvalidRequest`] for unknown keys or bad values.
pub fn update_query<M: Model>(
    record: &Map<String, Value>,
    pk: i64,
) -> Result<QueryBuilder<'static, Postgres>, AgentError> {
    let mut builder = QueryBuilder::new("UPDATE ");
    builder.push(quote_ident(M::TABLE));
    builder.push(" SET ");
    for (key, value) in record {
        let field = known_field::<M>(key)?;
        if !field.is_writable() || value.is_null() {
            continue;
        }
        builder.push(quote_ident(field.name));
        builder.push(" = ");
        SqlValue::coerce(field, value)?.push_bind(&mut builder);
        builder.push(", ");
    }
    builder.push("\"updated_at\" = NOW() WHERE \"id\" = ");
    builder.push_bind(pk);
    builder.push(" RETURNING *");
    Ok(builder)
}

fn known_field<M: Model>(key: &str) -> Result<&'static Field, AgentError> {
    M::field(key).ok_or_else(|| {
        AgentError::InvalidRequest(format!("{key} is not a field of {}", M::TABLE))
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::{Desk, Patient, Scheduler, Treatment};

    fn record(value: Value) -> Map<String, Value> {
        let Value::Object(map) = value else {
            panic!("expected object");
        };
        map
    }

    #[test]
    fn insert_skips_managed_columns() {
        let Ok(builder) = insert_query::<Desk>(&record(json!({
            "id": 99,
            "created_at": "2024-01-01T00:00:00Z",
            "number": "Mesa 1",
            "capacity": 2,
            "vacancy": true,
        }))) else {
            panic!("valid record");
        };
        assert_eq!(
            builder.sql(),
            "INSERT INTO \"desks\" (\"capacity\", \"number\", \"vacancy\") \
             VALUES ($1, $2, $3) RETURNING *"
        );
    }

    #[test]
    fn insert_binds_null_literally() {
        let Ok(builder) = insert_query::<Desk>(&record(json!({
            "number": "2",
            "observation": null,
        }))) else {
            panic!("valid record");
        };
        assert_eq!(
            builder.sql(),
            "INSERT INTO \"desks\" (\"number\", \"observation\") VALUES ($1, NULL) RETURNING *"
        );
    }

    #[test]
    fn insert_rejects_unknown_keys() {
        let result = insert_query::<Desk>(&record(json!({ "colour": "red" })));
        let Err(AgentError::InvalidRequest(msg)) = result else {
            panic!("expected validation error");
        };
        assert_eq!(msg, "colour is not a field of desks");
    }

    #[test]
    fn insert_requires_columns_without_default() {
        let Err(AgentError::InvalidRequest(msg)) = insert_query::<Desk>(&Map::new()) else {
            panic!("expected validation error");
        };
        assert_eq!(msg, "number: this field is required");

        let result = insert_query::<Patient>(&record(json!({ "phone": "1199999" })));
        let Err(AgentError::InvalidRequest(msg)) = result else {
            panic!("expected validation error");
        };
        assert_eq!(msg, "full_name: this field is required");
    }

    #[test]
    fn insert_lets_the_table_fill_defaults() {
        let Ok(builder) = insert_query::<Patient>(&record(json!({ "full_name": "Ana" }))) else {
            panic!("gender has a default");
        };
        assert_eq!(
            builder.sql(),
            "INSERT INTO \"patients\" (\"full_name\") VALUES ($1) RETURNING *"
        );
    }

    #[test]
    fn over_long_values_are_rejected_before_the_database() {
        let result = insert_query::<Patient>(&record(json!({
            "full_name": "Ana",
            "phone": "0".repeat(25),
        })));
        assert!(matches!(result, Err(AgentError::InvalidRequest(_))));

        let result = update_query::<Treatment>(&record(json!({ "cost": "100000000000" })), 1);
        assert!(matches!(result, Err(AgentError::InvalidRequest(_))));
    }

    #[test]
    fn taxpayer_id_holds_twelve_characters() {
        let fits = record(json!({ "full_name": "Ana", "taxpayer_id": "123456789012" }));
        assert!(insert_query::<Patient>(&fits).is_ok());
        let Err(AgentError::InvalidRequest(msg)) = insert_query::<Patient>(&record(
            json!({ "full_name": "Ana", "taxpayer_id": "1234567890123" }),
        )) else {
            panic!("expected validation error");
        };
        assert_eq!(msg, "taxpayer_id: ensure this value has at most 12 characters");
    }

    #[test]
    fn update_skips_nulls_and_bumps_timestamp() {
        let Ok(builder) = update_query::<Scheduler>(
            &record(json!({ "id": 5, "status": "DONE", "description": null, "user": "Ana" })),
            5,
        ) else {
            panic!("valid record");
        };
        assert_eq!(
            builder.sql(),
            "UPDATE \"schedulers\" SET \"status\" = $1, \"user\" = $2, \
             \"updated_at\" = NOW() WHERE \"id\" = $3 RETURNING *"
        );
    }

    #[test]
    fn update_validates_choices() {
        let result = update_query::<Scheduler>(&record(json!({ "status": "LATE" })), 1);
        assert!(matches!(result, Err(AgentError::InvalidRequest(_))));
    }

    #[test]
    fn count_shares_the_filter() {
        let Ok(filter) = ListFilter::<Desk>::new().with("deleted", json!(false)) else {
            panic!("valid filter");
        };
        assert_eq!(
            count_query(&filter).sql(),
            "SELECT COUNT(*) FROM \"desks\" WHERE 1=1 AND \"deleted\" = $1"
        );
    }

    async fn test_repository<M: Model>() -> Repository<M> {
        Repository::new(crate::manager::test_pool().await)
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn crud_round_trip() {
        let repo = test_repository::<crate::models::Specialty>().await;
        let name = format!("specialty-{}", uuid::Uuid::new_v4().simple());
        let Ok(created) = repo.add(&record(json!({ "name": name }))).await else {
            panic!("insert failed");
        };
        assert!(!created.base.deleted);

        let Ok(Some(found)) = repo.get_by_field("name", json!(name)).await else {
            panic!("lookup failed");
        };
        assert_eq!(found.id(), created.id());

        let Ok(Some(updated)) = repo.update(&record(json!({ "deleted": true })), created.id()).await
        else {
            panic!("update failed");
        };
        assert!(updated.base.deleted);
        assert!(updated.base.updated_at >= created.base.updated_at);

        assert!(matches!(repo.delete(created.id()).await, Ok(true)));
        assert!(matches!(repo.delete(created.id()).await, Ok(false)));
        assert!(matches!(repo.get_by_id(created.id()).await, Ok(None)));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn get_or_create_is_idempotent() {
        let repo = test_repository::<crate::models::Profile>().await;
        let name = format!("profile-{}", uuid::Uuid::new_v4().simple());
        let lookup = record(json!({ "name": name }));
        let Ok((first, created)) = repo.get_or_create(&lookup, &Map::new()).await else {
            panic!("first call failed");
        };
        assert!(created);
        let Ok((second, created)) = repo.get_or_create(&lookup, &Map::new()).await else {
            panic!("second call failed");
        };
        assert!(!created);
        assert_eq!(first.id(), second.id());
        let _ = repo.delete(first.id()).await;
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn payment_points_at_the_license_assignment() {
        use crate::models::{License, LicenseUser, Payment, User};

        let pool = crate::manager::test_pool().await;
        let tag = uuid::Uuid::new_v4().simple().to_string();
        let Ok(user) = Repository::<User>::new(pool.clone())
            .add(&record(json!({
                "full_name": "Payer",
                "password": "x",
                "username": format!("payer-{tag}"),
                "email": format!("{tag}@example.com"),
            })))
            .await
        else {
            panic!("user insert failed");
        };
        let Ok(license) = Repository::<License>::new(pool.clone())
            .add(&record(json!({ "license_number": "L-1", "modules": "all", "value": "150.00" })))
            .await
        else {
            panic!("license insert failed");
        };
        let Ok(assignment) = Repository::<LicenseUser>::new(pool.clone())
            .add(&record(json!({
                "user_id": user.id(),
                "license_id": license.id(),
                "start_date": "2024-01-01",
                "end_date": "2024-12-31",
                "off_percentage": "0",
                "credit": "0",
            })))
            .await
        else {
            panic!("assignment insert failed");
        };

        let payments = Repository::<Payment>::new(pool);
        let Ok(payment) = payments
            .add(&record(json!({
                "license_id": assignment.id(),
                "value": "150.00",
                "payment_date": "2024-02-01",
            })))
            .await
        else {
            panic!("payment against an assignment should insert");
        };
        assert_eq!(payment.license_id, assignment.id());

        let orphan = payments
            .add(&record(json!({
                "license_id": -1,
                "value": "1.00",
                "payment_date": "2024-02-01",
            })))
            .await;
        assert!(matches!(orphan, Err(AgentError::Conflict(_))));
        let _ = payments.delete(payment.id()).await;
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn patient_with_documents_is_not_removed() {
        use crate::models::Document;

        let pool = crate::manager::test_pool().await;
        let patients = Repository::<Patient>::new(pool.clone());
        let documents = Repository::<Document>::new(pool);
        let Ok(patient) = patients.add(&record(json!({ "full_name": "Kept" }))).await else {
            panic!("patient insert failed");
        };
        let Ok(document) = documents
            .add(&record(json!({
                "patient_id": patient.id(),
                "file_name": "exam.pdf",
                "file_path": "/docs/exam.pdf",
            })))
            .await
        else {
            panic!("document insert failed");
        };

        assert!(matches!(
            patients.delete(patient.id()).await,
            Err(AgentError::Conflict(_))
        ));
        assert!(matches!(documents.delete(document.id()).await, Ok(true)));
        assert!(matches!(patients.delete(patient.id()).await, Ok(true)));
    }
}
