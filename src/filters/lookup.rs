//! Field lookups in `field__operator` form.

use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

use super::value::{SqlValue, parse_bool};
use crate::error::AgentError;
use crate::models::{Field, FieldKind, Model};

/// Comparison applied by a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `field` / `field__exact`.
    Exact,
    /// `field__not`.
    Not,
    /// `field__in`.
    In,
    /// `field__not_in`.
    NotIn,
    /// `field__gt`.
    Gt,
    /// `field__gte`.
    Gte,
    /// `field__lt`.
    Lt,
    /// `field__lte`.
    Lte,
    /// `field__contains`.
    Contains,
    /// `field__icontains`.
    IContains,
    /// `field__startswith`.
    StartsWith,
    /// `field__istartswith`.
    IStartsWith,
    /// `field__endswith`.
    EndsWith,
    /// `field__iendswith`.
    IEndsWith,
    /// `field__isnull`.
    IsNull,
}

impl Operator {
    fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "exact" => Self::Exact,
            "not" => Self::Not,
            "in" => Self::In,
            "not_in" => Self::NotIn,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "contains" => Self::Contains,
            "icontains" => Self::IContains,
            "startswith" => Self::StartsWith,
            "istartswith" => Self::IStartsWith,
            "endswith" => Self::EndsWith,
            "iendswith" => Self::IEndsWith,
            "isnull" => Self::IsNull,
            _ => return None,
        })
    }

    /// Whether the operator takes a list of values.
    #[must_use]
    pub const fn is_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    const fn comparison(self) -> Option<&'static str> {
        match self {
            Self::Exact => Some(" = "),
            Self::Not => Some(" <> "),
            Self::Gt => Some(" > "),
            Self::Gte => Some(" >= "),
            Self::Lt => Some(" < "),
            Self::Lte => Some(" <= "),
            _ => None,
        }
    }

    /// `(LIKE operator, leading %, trailing %)` for pattern lookups.
    const fn pattern(self) -> Option<(&'static str, bool, bool)> {
        match self {
            Self::Contains => Some((" LIKE ", true, true)),
            Self::IContains => Some((" ILIKE ", true, true)),
            Self::StartsWith => Some((" LIKE ", false, true)),
            Self::IStartsWith => Some((" ILIKE ", false, true)),
            Self::EndsWith => Some((" LIKE ", true, false)),
            Self::IEndsWith => Some((" ILIKE ", true, false)),
            _ => None,
        }
    }
}

/// A filter key split into column name and operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup<'a> {
    /// Column name.
    pub field: &'a str,
    /// Comparison.
    pub op: Operator,
}

impl<'a> Lookup<'a> {
    /// Splits `key` on its last `__` when the suffix is a known operator.
    #[must_use]
    pub fn parse(key: &'a str) -> Self {
        if let Some((field, suffix)) = key.rsplit_once("__") {
            if let Some(op) = Operator::from_suffix(suffix) {
                return Self { field, op };
            }
        }
        Self {
            field: key,
            op: Operator::Exact,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    One(SqlValue),
    Many(Vec<SqlValue>),
    Flag(bool),
}

/// A validated, typed `WHERE` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    field: &'static Field,
    op: Operator,
    operand: Operand,
}

impl Condition {
    /// Builds a predicate on model `M` from a filter key and its value.
    ///
    /// List operators accept a JSON array or a comma separated string.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidFilter`] for unknown fields and
    /// [`AgentError::InvalidRequest`] for values of the wrong type.
    pub fn new<M: Model>(key: &str, value: &Value) -> Result<Self, AgentError> {
        let lookup = Lookup::parse(key);
        let field = M::field(lookup.field).ok_or_else(|| {
            AgentError::InvalidFilter(format!(
                "{} is not a valid filter field for {}.",
                lookup.field,
                M::TABLE
            ))
        })?;

        let operand = match lookup.op {
            Operator::In | Operator::NotIn => Operand::Many(
                split_list(value)
                    .iter()
                    .map(|item| SqlValue::coerce(field, item))
                    .collect::<Result<_, _>>()?,
            ),
            Operator::IsNull => {
                let flag = match value {
                    Value::Bool(b) => Some(*b),
                    Value::String(s) => parse_bool(s),
                    _ => None,
                };
                Operand::Flag(flag.ok_or_else(|| {
                    AgentError::InvalidRequest(format!("{key}: expected a boolean"))
                })?)
            }
            op if op.pattern().is_some() => {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Operand::One(SqlValue::Text(text))
            }
            _ => Operand::One(SqlValue::coerce(field, value).or_else(|err| {
                // `field=null` is a valid `IS NULL` test even on required columns.
                if value.is_null() {
                    Ok(SqlValue::Null)
                } else {
                    Err(err)
                }
            })?),
        };

        Ok(Self {
            field,
            op: lookup.op,
            operand,
        })
    }

    /// Shorthand for an equality test on a known column.
    ///
    /// # Errors
    ///
    /// See [`Condition::new`].
    pub fn eq<M: Model>(field: &str, value: Value) -> Result<Self, AgentError> {
        Self::new::<M>(field, &value)
    }

    /// Column this predicate tests.
    #[must_use]
    pub fn field(&self) -> &'static Field {
        self.field
    }

    /// Appends the predicate (without a leading `AND`).
    pub fn push_sql(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        let column = quote_ident(self.field.name);
        match (&self.operand, self.op) {
            (Operand::Flag(is_null), _) => {
                builder.push(&column);
                builder.push(if *is_null { " IS NULL" } else { " IS NOT NULL" });
            }
            (Operand::Many(values), op) => {
                if values.is_empty() {
                    builder.push(if op == Operator::NotIn { "TRUE" } else { "FALSE" });
                    return;
                }
                builder.push(&column);
                builder.push(if op == Operator::NotIn { " NOT IN (" } else { " IN (" });
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        builder.push(", ");
                    }
                    value.clone().push_bind(builder);
                }
                builder.push(")");
            }
            (Operand::One(SqlValue::Null), Operator::Not) => {
                builder.push(&column);
                builder.push(" IS NOT NULL");
            }
            (Operand::One(SqlValue::Null), _) => {
                builder.push(&column);
                builder.push(" IS NULL");
            }
            (Operand::One(value), op) => {
                if let Some((like, lead, trail)) = op.pattern() {
                    if is_textual(self.field.kind) {
                        builder.push(&column);
                    } else {
                        builder.push(format!("{column}::text"));
                    }
                    builder.push(like);
                    let escaped = escape_like(&value.as_pattern_text());
                    let pattern = format!(
                        "{}{escaped}{}",
                        if lead { "%" } else { "" },
                        if trail { "%" } else { "" }
                    );
                    builder.push_bind(pattern);
                } else {
                    builder.push(&column);
                    builder.push(op.comparison().unwrap_or(" = "));
                    value.clone().push_bind(builder);
                }
            }
        }
    }
}

const fn is_textual(kind: FieldKind) -> bool {
    matches!(kind, FieldKind::Text | FieldKind::Choice(_))
}

/// Splits a list operand: JSON arrays pass through, strings split on `,`.
///
/// An empty string yields an empty list rather than `[""]`.
#[must_use]
pub fn split_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::String(s) if s.is_empty() => Vec::new(),
        Value::String(s) => s.split(',').map(|part| Value::String(part.to_string())).collect(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

/// Double-quotes a column or table name.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Escapes `%`, `_` and `\` for use inside a `LIKE` pattern.
#[must_use]
pub fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
