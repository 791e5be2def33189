//! Clinic data model.
//!
//! Every table row embeds a [`Base`] (id, timestamps, soft-delete flag)
//! and describes its own columns through the [`Model`] trait. The
//! descriptors drive the generic repository: they decide which keys a
//! record may carry and how JSON values are bound to SQL parameters.

pub mod auth;
pub mod care;
pub mod clinic;
pub mod enums;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::postgres::PgRow;

pub use auth::{Log, Permission, Profile, Token, User};
pub use care::{
    Anamnesis, Answer, Document, Patient, Plan, PlanTreatment, Question, Specialty, Treatment,
    TreatmentPatient, Urgency,
};
pub use clinic::{Clinic, Desk, Holiday, License, LicenseUser, Payment, Scheduler};
pub use enums::{Action, Gender, SchedulerStatus, Theme};

/// Columns shared by every table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Base {
    /// Primary key (`BIGSERIAL`).
    pub id: i64,
    /// Set once on insert.
    pub created_at: DateTime<Utc>,
    /// Bumped on every update.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted: bool,
}

/// Storage kind of a column, used to coerce incoming JSON values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `VARCHAR` / `TEXT`.
    Text,
    /// `INT` / `BIGINT`, including foreign keys.
    Integer,
    /// `BOOL`.
    Boolean,
    /// `DECIMAL(10, 2)`.
    Decimal,
    /// `DATE`.
    Date,
    /// `TIMESTAMPTZ`.
    DateTime,
    /// `VARCHAR` restricted to the listed values.
    Choice(&'static [&'static str]),
}

/// Column descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Column name.
    pub name: &'static str,
    /// Storage kind.
    pub kind: FieldKind,
    /// Whether `NULL` is accepted.
    pub nullable: bool,
    /// Whether the table fills the column when an insert omits it.
    pub has_default: bool,
    /// Character limit of a `VARCHAR` column.
    pub max_length: Option<usize>,
}

impl Field {
    /// Non-null column of the given kind.
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
            has_default: false,
            max_length: None,
        }
    }

    /// Nullable column of the given kind.
    #[must_use]
    pub const fn null(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
            has_default: false,
            max_length: None,
        }
    }

    /// Marks the column as filled by a table default.
    #[must_use]
    pub const fn defaulted(mut self) -> Self {
        self.has_default = true;
        self
    }

    /// Limits the column to `max` characters.
    #[must_use]
    pub const fn max_len(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Whether clients may write this column directly.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        !matches!(self.name, "id" | "created_at" | "updated_at")
    }

    /// Whether an insert must supply this column.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.is_writable() && !self.nullable && !self.has_default
    }
}

/// Descriptors for the [`Base`] columns.
pub const BASE_FIELDS: &[Field] = &[
    Field::new("id", FieldKind::Integer),
    Field::new("created_at", FieldKind::DateTime),
    Field::new("updated_at", FieldKind::DateTime),
    Field::new("deleted", FieldKind::Boolean).defaulted(),
];

/// A table-backed entity.
pub trait Model: for<'r> FromRow<'r, PgRow> + Serialize + Send + Sync + Unpin + 'static {
    /// Table name.
    const TABLE: &'static str;
    /// Model name recorded in audit logs.
    const NAME: &'static str;
    /// Own columns, excluding [`BASE_FIELDS`].
    const FIELDS: &'static [Field];
    /// Columns matched by the free-text `search` filter.
    const SEARCH_FIELDS: &'static [&'static str] = &[];

    /// Shared columns of this row.
    fn base(&self) -> &Base;

    /// Primary key of this row.
    fn id(&self) -> i64 {
        self.base().id
    }

    /// Looks up a column descriptor by name, base columns included.
    #[must_use]
    fn field(name: &str) -> Option<&'static Field> {
        BASE_FIELDS
            .iter()
            .chain(Self::FIELDS.iter())
            .find(|f| f.name == name)
    }

    /// Iterates over every column descriptor, base columns first.
    fn all_fields() -> impl Iterator<Item = &'static Field> {
        BASE_FIELDS.iter().chain(Self::FIELDS.iter())
    }
}
