//! List filters: field lookups, free-text search, ordering and pagination.
//!
//! A [`ListFilter`] is built from query parameters (or a JSON object) for
//! a specific [`Model`], validated against the model's column
//! descriptors, and rendered into a `QueryBuilder` by the repository.

pub mod lookup;
pub mod pagination;
pub mod value;

use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;

use serde_json::{Map, Value};
use sqlx::{Postgres, QueryBuilder};

pub use lookup::{Condition, Lookup, Operator, quote_ident};
pub use pagination::{Page, Pagination};
pub use value::SqlValue;

use crate::error::AgentError;
use crate::models::Model;

/// Query parameter holding the ordering list.
pub const ORDERING_PARAM: &str = "order_by";

/// Query parameter holding the free-text search term.
pub const SEARCH_PARAM: &str = "search";

/// Parameters consumed by pagination rather than filtering.
const PAGINATION_PARAMS: &[&str] = &["page", "size"];

/// One `ORDER BY` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerm {
    /// Column name.
    pub field: &'static str,
    /// `DESC` when the client prefixed the field with `-`.
    pub descending: bool,
}

impl OrderTerm {
    /// Newest rows first.
    pub const NEWEST_FIRST: Self = Self {
        field: "created_at",
        descending: true,
    };
}

/// Validated filter for model `M`.
#[derive(Debug)]
pub struct ListFilter<M> {
    conditions: Vec<Condition>,
    search: Option<String>,
    ordering: Vec<OrderTerm>,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for ListFilter<M> {
    fn clone(&self) -> Self {
        Self {
            conditions: self.conditions.clone(),
            search: self.search.clone(),
            ordering: self.ordering.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> Default for ListFilter<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> ListFilter<M> {
    /// A filter that matches every row, unordered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            conditions: Vec::new(),
            search: None,
            ordering: Vec::new(),
            _model: PhantomData,
        }
    }

    /// Builds a filter from raw query parameters.
    ///
    /// `page` and `size` are ignored; see [`Pagination`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidFilter`] for unknown fields or an
    /// invalid ordering, [`AgentError::InvalidRequest`] for values that
    /// do not fit their column.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, AgentError> {
        // Sorted so validation errors do not depend on hash order.
        let sorted: BTreeMap<&str, &str> = params
            .iter()
            .filter(|(k, _)| !PAGINATION_PARAMS.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        Self::from_pairs(
            sorted
                .into_iter()
                .map(|(k, v)| (k, Value::String(v.to_string()))),
        )
    }

    /// Builds a filter from a JSON object, as passed by library callers.
    ///
    /// # Errors
    ///
    /// See [`ListFilter::from_params`].
    pub fn from_record(record: &Map<String, Value>) -> Result<Self, AgentError> {
        Self::from_pairs(record.iter().map(|(k, v)| (k.as_str(), v.clone())))
    }

    fn from_pairs<'a>(pairs: impl Iterator<Item = (&'a str, Value)>) -> Result<Self, AgentError> {
        let mut filter = Self::new();
        for (key, value) in pairs {
            match key {
                ORDERING_PARAM => filter.ordering = parse_ordering::<M>(&value)?,
                SEARCH_PARAM => {
                    let term = match &value {
                        Value::String(s) => s.trim().to_string(),
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    if term.is_empty() {
                        continue;
                    }
                    if M::SEARCH_FIELDS.is_empty() {
                        return Err(AgentError::InvalidFilter(format!(
                            "search is not supported for {}.",
                            M::TABLE
                        )));
                    }
                    filter.search = Some(term);
                }
                _ => filter.conditions.push(Condition::new::<M>(key, &value)?),
            }
        }
        Ok(filter)
    }

    /// Adds an equality predicate.
    ///
    /// # Errors
    ///
    /// See [`Condition::new`].
    pub fn with(mut self, key: &str, value: Value) -> Result<Self, AgentError> {
        self.conditions.push(Condition::new::<M>(key, &value)?);
        Ok(self)
    }

    /// Adds an already validated predicate.
    #[must_use]
    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Replaces the ordering.
    #[must_use]
    pub fn ordered_by(mut self, ordering: Vec<OrderTerm>) -> Self {
        self.ordering = ordering;
        self
    }

    /// Validated predicates.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Requested ordering; empty when the client gave none.
    #[must_use]
    pub fn ordering(&self) -> &[OrderTerm] {
        &self.ordering
    }

    /// Search term, if any.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Appends ` WHERE 1=1 AND ...` for every predicate and the search.
    pub fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE 1=1");
        for condition in &self.conditions {
            builder.push(" AND ");
            condition.push_sql(builder);
        }
        if let Some(term) = &self.search {
            let pattern = format!("%{}%", lookup::escape_like(term));
            builder.push(" AND (");
            for (i, name) in M::SEARCH_FIELDS.iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                builder.push(quote_ident(name));
                builder.push(" ILIKE ");
                builder.push_bind(pattern.clone());
            }
            builder.push(")");
        }
    }

    /// Appends ` ORDER BY ...`, falling back to `default` when no
    /// ordering was requested. `id` is added as a tie-breaker so pages
    /// are stable.
    pub fn push_order_by(&self, builder: &mut QueryBuilder<'_, Postgres>, default: &[OrderTerm]) {
        let terms = if self.ordering.is_empty() {
            default
        } else {
            self.ordering.as_slice()
        };
        let mut parts: Vec<String> = terms
            .iter()
            .map(|term| {
                let direction = if term.descending { "DESC" } else { "ASC" };
                format!("{} {direction}", quote_ident(term.field))
            })
            .collect();
        if !terms.iter().any(|t| t.field == "id") {
            let descending = terms.first().is_some_and(|t| t.descending);
            parts.push(format!("\"id\" {}", if descending { "DESC" } else { "ASC" }));
        }
        builder.push(" ORDER BY ");
        builder.push(parts.join(", "));
    }
}

/// Parses and validates an ordering list.
///
/// Entries are trimmed and blanks dropped. Each bare field name must be a
/// column of `M` and may appear once.
///
/// # Errors
///
/// Returns [`AgentError::InvalidFilter`] on unknown or repeated fields.
pub fn parse_ordering<M: Model>(value: &Value) -> Result<Vec<OrderTerm>, AgentError> {
    let entries: Vec<String> = lookup::split_list(value)
        .into_iter()
        .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .collect();

    let mut usages: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut terms = Vec::with_capacity(entries.len());
    for entry in &entries {
        let bare = entry.replace(['-', '+'], "");
        let Some(field) = M::field(&bare) else {
            return Err(AgentError::InvalidFilter(format!(
                "{bare} is not a valid ordering field."
            )));
        };
        usages.entry(bare).or_default().push(entry.clone());
        terms.push(OrderTerm {
            field: field.name,
            descending: entry.starts_with('-'),
        });
    }

    let ambiguous: Vec<&str> = usages
        .values()
        .filter(|uses| uses.len() > 1)
        .flatten()
        .map(String::as_str)
        .collect();
    if !ambiguous.is_empty() {
        return Err(AgentError::InvalidFilter(format!(
            "Field names can appear at most once for {ORDERING_PARAM}. \
             The following was ambiguous: {}.",
            ambiguous.join(", ")
        )));
    }

    Ok(terms)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::{Desk, Patient};

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn with_base<M: Model>(filter: &ListFilter<M>, base: Vec<Condition>) -> ListFilter<M> {
        base.into_iter().fold(filter.clone(), ListFilter::and)
    }

    #[test]
    fn generic_clone_keeps_the_original_untouched() {
        let Ok(filter) = ListFilter::<Desk>::from_params(&params(&[("order_by", "-number")])) else {
            panic!("valid filter");
        };
        let Ok(live) = Condition::eq::<Desk>("deleted", json!(false)) else {
            panic!("valid condition");
        };
        let extended = with_base(&filter, vec![live]);
        assert!(filter.conditions().is_empty());
        assert_eq!(extended.conditions().len(), 1);
        assert_eq!(extended.ordering(), filter.ordering());
    }

    #[test]
    fn ordering_is_split_and_trimmed() {
        let Ok(terms) = parse_ordering::<Patient>(&json!(" -full_name , ,birth_date")) else {
            panic!("valid ordering");
        };
        assert_eq!(
            terms,
            vec![
                OrderTerm {
                    field: "full_name",
                    descending: true
                },
                OrderTerm {
                    field: "birth_date",
                    descending: false
                },
            ]
        );
    }

    #[test]
    fn empty_ordering_means_none() {
        assert_eq!(parse_ordering::<Patient>(&json!("")).ok(), Some(Vec::new()));
        assert_eq!(parse_ordering::<Patient>(&json!(" , ")).ok(), Some(Vec::new()));
    }

    #[test]
    fn unknown_ordering_field_is_rejected() {
        let Err(AgentError::InvalidFilter(msg)) = parse_ordering::<Patient>(&json!("-salary"))
        else {
            panic!("expected error");
        };
        assert_eq!(msg, "salary is not a valid ordering field.");
    }

    #[test]
    fn repeated_ordering_field_lists_all_ambiguous_entries() {
        let Err(AgentError::InvalidFilter(msg)) =
            parse_ordering::<Patient>(&json!("-phone,full_name,+phone,-full_name,id"))
        else {
            panic!("expected error");
        };
        assert_eq!(
            msg,
            "Field names can appear at most once for order_by. \
             The following was ambiguous: full_name, -full_name, -phone, +phone."
        );
    }

    #[test]
    fn params_skip_pagination_and_render_sql() {
        let Ok(filter) = ListFilter::<Desk>::from_params(&params(&[
            ("page", "2"),
            ("size", "10"),
            ("vacancy", "true"),
            ("capacity__gt", "1"),
            ("order_by", "-capacity"),
        ])) else {
            panic!("valid filter");
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM \"desks\"");
        filter.push_where(&mut builder);
        filter.push_order_by(&mut builder, &[OrderTerm::NEWEST_FIRST]);
        assert_eq!(
            builder.sql(),
            "SELECT * FROM \"desks\" WHERE 1=1 AND \"capacity\" > $1 AND \"vacancy\" = $2 \
             ORDER BY \"capacity\" DESC, \"id\" DESC"
        );
    }

    #[test]
    fn search_ors_every_search_field() {
        let Ok(filter) = ListFilter::<Patient>::from_params(&params(&[("search", " silva ")]))
        else {
            panic!("valid filter");
        };
        assert_eq!(filter.search(), Some("silva"));
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1");
        filter.push_where(&mut builder);
        assert_eq!(
            builder.sql(),
            "SELECT 1 WHERE 1=1 AND (\"full_name\" ILIKE $1 OR \"taxpayer_id\" ILIKE $2 \
             OR \"phone\" ILIKE $3)"
        );
    }

    #[test]
    fn default_ordering_applies_without_request() {
        let filter = ListFilter::<Desk>::new();
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1");
        filter.push_order_by(&mut builder, &[OrderTerm::NEWEST_FIRST]);
        assert_eq!(builder.sql(), "SELECT 1 ORDER BY \"created_at\" DESC, \"id\" DESC");
    }

    #[test]
    fn record_filters_use_json_types() {
        let Ok(filter) = ListFilter::<Desk>::from_record(&Map::from_iter([
            ("capacity".to_string(), json!(2)),
            ("deleted".to_string(), json!(false)),
        ])) else {
            panic!("valid filter");
        };
        assert_eq!(filter.conditions().len(), 2);
        assert!(filter.ordering().is_empty());
    }

    #[test]
    fn unknown_filter_field_is_rejected() {
        let result = ListFilter::<Desk>::from_params(&params(&[("colour", "red")]));
        assert!(matches!(result, Err(AgentError::InvalidFilter(_))));
    }
}
