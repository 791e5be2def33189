//! Coercion of JSON / query-string values into typed SQL parameters.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

use crate::config::{DEFAULT_DATE_FORMAT, DEFAULT_DATE_TIME_FORMAT};
use crate::error::AgentError;
use crate::models::{Field, FieldKind};

/// Exclusive bound of a `NUMERIC(10, 2)` column.
const DECIMAL_LIMIT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

/// A value ready to be bound to a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL `NULL`.
    Null,
    /// `BOOL`.
    Bool(bool),
    /// `BIGINT`.
    Int(i64),
    /// `NUMERIC`.
    Decimal(Decimal),
    /// `TEXT` / `VARCHAR`.
    Text(String),
    /// `DATE`.
    Date(NaiveDate),
    /// `TIMESTAMPTZ`.
    DateTime(DateTime<Utc>),
}

impl SqlValue {
    /// Converts `value` to the storage kind of `field`.
    ///
    /// Strings are accepted for every kind, so query-string filters and
    /// JSON bodies go through the same path.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidRequest`] when the value cannot be
    /// represented in the column.
    pub fn coerce(field: &Field, value: &Value) -> Result<Self, AgentError> {
        if value.is_null() {
            return if field.nullable {
                Ok(Self::Null)
            } else {
                Err(invalid(field, "may not be null"))
            };
        }

        match field.kind {
            FieldKind::Text => {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return Err(invalid(field, "expected a string")),
                };
                match field.max_length {
                    Some(max) if text.chars().count() > max => Err(invalid(
                        field,
                        &format!("ensure this value has at most {max} characters"),
                    )),
                    _ => Ok(Self::Text(text)),
                }
            }
            FieldKind::Choice(choices) => {
                let Some(s) = value.as_str() else {
                    return Err(invalid(field, "expected a string"));
                };
                if choices.contains(&s) {
                    Ok(Self::Text(s.to_string()))
                } else {
                    Err(invalid(
                        field,
                        &format!("expected one of {}", choices.join(", ")),
                    ))
                }
            }
            FieldKind::Integer => match value {
                Value::Number(n) => n
                    .as_i64()
                    .map(Self::Int)
                    .ok_or_else(|| invalid(field, "expected an integer")),
                Value::String(s) => s
                    .trim()
                    .parse()
                    .map(Self::Int)
                    .map_err(|_| invalid(field, "expected an integer")),
                _ => Err(invalid(field, "expected an integer")),
            },
            FieldKind::Boolean => match value {
                Value::Bool(b) => Ok(Self::Bool(*b)),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Ok(Self::Bool(false)),
                    Some(1) => Ok(Self::Bool(true)),
                    _ => Err(invalid(field, "expected a boolean")),
                },
                Value::String(s) => parse_bool(s)
                    .map(Self::Bool)
                    .ok_or_else(|| invalid(field, "expected a boolean")),
                _ => Err(invalid(field, "expected a boolean")),
            },
            FieldKind::Decimal => {
                let raw = match value {
                    Value::Number(n) => n.to_string(),
                    Value::String(s) => s.trim().to_string(),
                    _ => return Err(invalid(field, "expected a decimal")),
                };
                let amount = Decimal::from_str(&raw)
                    .or_else(|_| Decimal::from_scientific(&raw))
                    .map_err(|_| invalid(field, "expected a decimal"))?;
                if amount.abs() >= DECIMAL_LIMIT {
                    return Err(invalid(
                        field,
                        "ensure there are no more than 8 digits before the decimal point",
                    ));
                }
                Ok(Self::Decimal(amount))
            }
            FieldKind::Date => value
                .as_str()
                .and_then(parse_date)
                .map(Self::Date)
                .ok_or_else(|| invalid(field, "expected a date (YYYY-MM-DD)")),
            FieldKind::DateTime => value
                .as_str()
                .and_then(parse_date_time)
                .map(Self::DateTime)
                .ok_or_else(|| invalid(field, "expected an RFC 3339 timestamp")),
        }
    }

    /// Binds this value as the next query parameter.
    pub fn push_bind(self, builder: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::Null => {
                builder.push("NULL");
            }
            Self::Bool(v) => {
                builder.push_bind(v);
            }
            Self::Int(v) => {
                builder.push_bind(v);
            }
            Self::Decimal(v) => {
                builder.push_bind(v);
            }
            Self::Text(v) => {
                builder.push_bind(v);
            }
            Self::Date(v) => {
                builder.push_bind(v);
            }
            Self::DateTime(v) => {
                builder.push_bind(v);
            }
        }
    }

    /// Text form used by pattern lookups (`contains`, `startswith`...).
    #[must_use]
    pub fn as_pattern_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Decimal(v) => v.to_string(),
            Self::Text(v) => v.clone(),
            Self::Date(v) => v.to_string(),
            Self::DateTime(v) => v.to_rfc3339(),
        }
    }
}

fn invalid(field: &Field, reason: &str) -> AgentError {
    AgentError::InvalidRequest(format!("{}: {reason}", field.name))
}

/// Parses `true`/`false`/`1`/`0` (case-insensitive).
#[must_use]
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, DEFAULT_DATE_FORMAT))
        .ok()
}

fn parse_date_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", DEFAULT_DATE_TIME_FORMAT]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| parse_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0)))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::SchedulerStatus;

    const CAPACITY: Field = Field::new("capacity", FieldKind::Integer);
    const PHONE: Field = Field::null("phone", FieldKind::Text);
    const STATUS: Field = Field::new("status", FieldKind::Choice(SchedulerStatus::VALUES));

    #[test]
    fn integers_accept_numbers_and_strings() {
        assert_eq!(SqlValue::coerce(&CAPACITY, &json!(3)).ok(), Some(SqlValue::Int(3)));
        assert_eq!(SqlValue::coerce(&CAPACITY, &json!(" 4 ")).ok(), Some(SqlValue::Int(4)));
        assert!(SqlValue::coerce(&CAPACITY, &json!("four")).is_err());
    }

    #[test]
    fn null_only_for_nullable_columns() {
        assert_eq!(SqlValue::coerce(&PHONE, &Value::Null).ok(), Some(SqlValue::Null));
        let Err(AgentError::InvalidRequest(msg)) = SqlValue::coerce(&CAPACITY, &Value::Null) else {
            panic!("expected validation error");
        };
        assert_eq!(msg, "capacity: may not be null");
    }

    #[test]
    fn choices_are_checked() {
        assert!(SqlValue::coerce(&STATUS, &json!("DONE")).is_ok());
        assert!(SqlValue::coerce(&STATUS, &json!("done")).is_err());
    }

    #[test]
    fn decimals_from_numbers_and_strings() {
        let price = Field::new("value", FieldKind::Decimal);
        assert_eq!(
            SqlValue::coerce(&price, &json!("10.50")).ok(),
            Some(SqlValue::Decimal(Decimal::new(1050, 2)))
        );
        assert_eq!(
            SqlValue::coerce(&price, &json!(2.5)).ok(),
            Some(SqlValue::Decimal(Decimal::new(25, 1)))
        );
    }

    #[test]
    fn text_respects_column_length() {
        let phone = Field::null("phone", FieldKind::Text).max_len(20);
        assert!(SqlValue::coerce(&phone, &json!("+55 11 91234-5678")).is_ok());
        let Err(AgentError::InvalidRequest(msg)) =
            SqlValue::coerce(&phone, &json!("+55 11 91234-5678 ramal 12"))
        else {
            panic!("expected validation error");
        };
        assert_eq!(msg, "phone: ensure this value has at most 20 characters");
        // Characters, not bytes.
        let name = Field::new("name", FieldKind::Text).max_len(4);
        assert!(SqlValue::coerce(&name, &json!("João")).is_ok());
    }

    #[test]
    fn decimals_fit_numeric_precision() {
        let cost = Field::new("cost", FieldKind::Decimal);
        assert!(SqlValue::coerce(&cost, &json!("99999999.99")).is_ok());
        assert!(SqlValue::coerce(&cost, &json!("-99999999.99")).is_ok());
        assert!(matches!(
            SqlValue::coerce(&cost, &json!("100000000000")),
            Err(AgentError::InvalidRequest(_))
        ));
    }

    #[test]
    fn dates_accept_iso_and_day_first() {
        let field = Field::new("start_date", FieldKind::Date);
        let expected = NaiveDate::from_ymd_opt(2024, 7, 8).map(SqlValue::Date);
        assert_eq!(SqlValue::coerce(&field, &json!("2024-07-08")).ok(), expected);
        assert_eq!(SqlValue::coerce(&field, &json!("08/07/2024")).ok(), expected);
    }

    #[test]
    fn timestamps_accept_offsets() {
        let field = Field::new("date", FieldKind::DateTime);
        let Ok(SqlValue::DateTime(at)) = SqlValue::coerce(&field, &json!("2024-07-08T10:00:00-03:00"))
        else {
            panic!("expected timestamp");
        };
        assert_eq!(at.to_rfc3339(), "2024-07-08T13:00:00+00:00");
    }

    #[test]
    fn booleans_accept_common_spellings() {
        let field = Field::new("deleted", FieldKind::Boolean);
        assert_eq!(SqlValue::coerce(&field, &json!("TRUE")).ok(), Some(SqlValue::Bool(true)));
        assert_eq!(SqlValue::coerce(&field, &json!(0)).ok(), Some(SqlValue::Bool(false)));
        assert!(SqlValue::coerce(&field, &json!("yes")).is_err());
    }
}
