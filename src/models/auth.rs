//! Accounts, access control and the audit log.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::enums::{Action, Theme};
use super::{Base, Field, FieldKind, Model};
use crate::config::DEFAULT_DATE_TIME_FORMAT;

/// An application user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Display name.
    pub full_name: String,
    /// Bcrypt hash; never serialized.
    #[serde(skip_serializing)]
    pub password: String,
    /// Unique login name.
    pub username: String,
    /// Unique email.
    pub email: String,
    /// Taxpayer registration number.
    pub taxpayer_id: Option<String>,
    /// Contact phone.
    pub phone: Option<String>,
    /// Stored avatar path.
    pub profile_picture_path: Option<String>,
    /// Owner of the clinic account.
    pub is_clinic_master: bool,
    /// Unrestricted access.
    pub is_superuser: bool,
    /// Disabled users cannot log in.
    pub is_active: bool,
    /// Preferred theme.
    #[sqlx(try_from = "String")]
    pub theme: Theme,
    /// Last successful login.
    pub last_login_in: Option<DateTime<Utc>>,
    /// Access profile.
    pub profile_id: Option<i64>,
    /// Clinic the user belongs to.
    pub clinic_id: Option<i64>,
}

impl Model for User {
    const TABLE: &'static str = "users";
    const NAME: &'static str = "UserModel";
    const FIELDS: &'static [Field] = &[
        Field::new("full_name", FieldKind::Text).max_len(255),
        Field::new("password", FieldKind::Text).max_len(255),
        Field::new("username", FieldKind::Text).max_len(255),
        Field::new("email", FieldKind::Text).max_len(255),
        Field::null("taxpayer_id", FieldKind::Text).max_len(12),
        Field::null("phone", FieldKind::Text).max_len(20),
        Field::null("profile_picture_path", FieldKind::Text).max_len(255),
        Field::new("is_clinic_master", FieldKind::Boolean).defaulted(),
        Field::new("is_superuser", FieldKind::Boolean).defaulted(),
        Field::new("is_active", FieldKind::Boolean).defaulted(),
        Field::new("theme", FieldKind::Choice(Theme::VALUES)).defaulted(),
        Field::null("last_login_in", FieldKind::DateTime),
        Field::null("profile_id", FieldKind::Integer),
        Field::null("clinic_id", FieldKind::Integer),
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["full_name", "username", "email"];

    fn base(&self) -> &Base {
        &self.base
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// A named set of permissions.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Profile name.
    pub name: String,
    /// Owning clinic; `None` for global profiles.
    pub clinic_id: Option<i64>,
}

impl Model for Profile {
    const TABLE: &'static str = "profiles";
    const NAME: &'static str = "ProfileModel";
    const FIELDS: &'static [Field] = &[
        Field::new("name", FieldKind::Text).max_len(255),
        Field::null("clinic_id", FieldKind::Integer),
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["name"];

    fn base(&self) -> &Base {
        &self.base
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Permission to perform an action on a model of a module.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Permission {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Application module.
    pub module: String,
    /// Model inside the module.
    pub model: String,
    /// Granted action.
    #[sqlx(try_from = "String")]
    pub action: Action,
    /// Human readable description.
    pub description: String,
}

impl Model for Permission {
    const TABLE: &'static str = "permissions";
    const NAME: &'static str = "PermissionModel";
    const FIELDS: &'static [Field] = &[
        Field::new("module", FieldKind::Text).max_len(255),
        Field::new("model", FieldKind::Text).max_len(255),
        Field::new("action", FieldKind::Choice(Action::VALUES)).defaulted(),
        Field::new("description", FieldKind::Text).max_len(255),
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["module", "model", "description"];

    fn base(&self) -> &Base {
        &self.base
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} - {}", self.module, self.model, self.action)
    }
}

/// Issued access/refresh token pair.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Token {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Access token.
    pub token: String,
    /// Token owner.
    pub user_id: i64,
    /// Refresh token.
    pub refresh_token: String,
    /// Access token expiry.
    pub expires_at: DateTime<Utc>,
    /// Refresh token expiry.
    pub refresh_expires_at: DateTime<Utc>,
}

impl Model for Token {
    const TABLE: &'static str = "tokens";
    const NAME: &'static str = "TokenModel";
    const FIELDS: &'static [Field] = &[
        Field::new("token", FieldKind::Text).max_len(500),
        Field::new("user_id", FieldKind::Integer),
        Field::new("refresh_token", FieldKind::Text).max_len(500),
        Field::new("expires_at", FieldKind::DateTime),
        Field::new("refresh_expires_at", FieldKind::DateTime),
    ];

    fn base(&self) -> &Base {
        &self.base
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base.id)
    }
}

/// Audit trail entry written after every mutation.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Log {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Acting user, if known.
    pub user_id: Option<i64>,
    /// Module that performed the operation.
    pub module: String,
    /// Model touched by the operation.
    pub model: String,
    /// Operation label.
    pub operation: String,
    /// Primary key of the touched row.
    pub identifier: Option<i64>,
    /// When the operation happened.
    pub logged_in: DateTime<Utc>,
}

impl Model for Log {
    const TABLE: &'static str = "logs";
    const NAME: &'static str = "LogModel";
    const FIELDS: &'static [Field] = &[
        Field::null("user_id", FieldKind::Integer),
        Field::new("module", FieldKind::Text).max_len(100),
        Field::new("model", FieldKind::Text).max_len(100),
        Field::new("operation", FieldKind::Text).max_len(150),
        Field::null("identifier", FieldKind::Integer),
        Field::new("logged_in", FieldKind::DateTime).defaulted(),
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["module", "model", "operation"];

    fn base(&self) -> &Base {
        &self.base
    }
}

impl fmt::Display for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} - {}",
            self.module,
            self.operation,
            self.logged_in.format(DEFAULT_DATE_TIME_FORMAT)
        )
    }
}
