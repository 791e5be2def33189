//! Many-to-many link tables.

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::AgentError;
use crate::filters::quote_ident;

/// A two-column link table between two models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTable {
    /// Table name.
    pub table: &'static str,
    /// Column referencing the owning side.
    pub owner: &'static str,
    /// Column referencing the linked side.
    pub target: &'static str,
}

/// Permissions granted to a profile.
pub const PROFILES_PERMISSIONS: LinkTable = LinkTable {
    table: "profiles_permissions",
    owner: "profile_id",
    target: "permission_id",
};

/// Specialties covered by a plan.
pub const PLANS_SPECIALTIES: LinkTable = LinkTable {
    table: "plans_specialties",
    owner: "plan_id",
    target: "specialty_id",
};

impl LinkTable {
    /// Links `owner` to every id in `targets`. Existing links are kept.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Conflict`] when an id does not exist.
    pub async fn add(&self, pool: &PgPool, owner: i64, targets: &[i64]) -> Result<u64, AgentError> {
        if targets.is_empty() {
            return Ok(0);
        }
        let mut builder = self.insert_query(owner, targets);
        let result = builder.build().execute(pool).await?;
        Ok(result.rows_affected())
    }

    /// Removes the links from `owner` to `targets`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Database`] on query failure.
    pub async fn remove(
        &self,
        pool: &PgPool,
        owner: i64,
        targets: &[i64],
    ) -> Result<u64, AgentError> {
        let mut builder = QueryBuilder::<Postgres>::new("DELETE FROM ");
        builder.push(quote_ident(self.table));
        builder.push(" WHERE ");
        builder.push(quote_ident(self.owner));
        builder.push(" = ");
        builder.push_bind(owner);
        builder.push(" AND ");
        builder.push(quote_ident(self.target));
        builder.push(" = ANY(");
        builder.push_bind(targets.to_vec());
        builder.push(")");
        let result = builder.build().execute(pool).await?;
        Ok(result.rows_affected())
    }

    /// Ids linked to `owner`, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Database`] on query failure.
    pub async fn targets(&self, pool: &PgPool, owner: i64) -> Result<Vec<i64>, AgentError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT ");
        builder.push(quote_ident(self.target));
        builder.push(" FROM ");
        builder.push(quote_ident(self.table));
        builder.push(" WHERE ");
        builder.push(quote_ident(self.owner));
        builder.push(" = ");
        builder.push_bind(owner);
        builder.push(" ORDER BY 1");
        let ids = builder.build_query_scalar::<i64>().fetch_all(pool).await?;
        Ok(ids)
    }

    fn insert_query(&self, owner: i64, targets: &[i64]) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new("INSERT INTO ");
        builder.push(quote_ident(self.table));
        builder.push(format!(
            " ({}, {}) ",
            quote_ident(self.owner),
            quote_ident(self.target)
        ));
        builder.push_values(targets.iter().copied(), |mut row, target| {
            row.push_bind(owner).push_bind(target);
        });
        builder.push(" ON CONFLICT DO NOTHING");
        builder
    }
}
