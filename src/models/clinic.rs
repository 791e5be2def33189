//! Clinics, licensing and the appointment agenda.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use super::enums::SchedulerStatus;
use super::{Base, Field, FieldKind, Model};

/// A clinic, optionally a subsidiary of a head quarter.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Clinic {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Parent clinic.
    pub head_quarter_id: Option<i64>,
    /// Legal name.
    pub company_name: String,
    /// Company registration number.
    pub company_register_number: String,
    /// Registered as a legal entity.
    pub legal_entity: bool,
    /// Street address.
    pub address: String,
    /// Unique subdomain used to route tenants.
    pub subdomain: String,
    /// Stored logo path.
    pub logo_path: Option<String>,
}

impl Model for Clinic {
    const TABLE: &'static str = "clinics";
    const NAME: &'static str = "ClinicModel";
    const FIELDS: &'static [Field] = &[
        Field::null("head_quarter_id", FieldKind::Integer),
        Field::new("company_name", FieldKind::Text).max_len(255),
        Field::new("company_register_number", FieldKind::Text).max_len(20),
        Field::new("legal_entity", FieldKind::Boolean).defaulted(),
        Field::new("address", FieldKind::Text).max_len(255),
        Field::new("subdomain", FieldKind::Text).max_len(255),
        Field::null("logo_path", FieldKind::Text).max_len(255),
    ];
    const SEARCH_FIELDS: &'static [&'static str] =
        &["company_name", "company_register_number", "subdomain"];

    fn base(&self) -> &Base {
        &self.base
    }
}

impl fmt::Display for Clinic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.company_name, self.legal_entity)
    }
}

/// A sellable license bundling application modules.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct License {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// License number.
    pub license_number: String,
    /// Comma separated module list.
    pub modules: String,
    /// Price.
    pub value: Decimal,
}

impl Model for License {
    const TABLE: &'static str = "licenses";
    const NAME: &'static str = "LicenseModel";
    const FIELDS: &'static [Field] = &[
        Field::new("license_number", FieldKind::Text).max_len(20),
        Field::new("modules", FieldKind::Text).max_len(255),
        Field::new("value", FieldKind::Decimal),
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["license_number", "modules"];

    fn base(&self) -> &Base {
        &self.base
    }
}

impl fmt::Display for License {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.license_number)
    }
}

/// A license granted to a user for a period.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LicenseUser {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Licensed user.
    pub user_id: i64,
    /// Granted license.
    pub license_id: i64,
    /// First valid day.
    pub start_date: NaiveDate,
    /// Last valid day.
    pub end_date: NaiveDate,
    /// Free text notes.
    pub observation: Option<String>,
    /// Discount percentage.
    pub off_percentage: Decimal,
    /// Remaining credit.
    pub credit: Decimal,
}

impl Model for LicenseUser {
    const TABLE: &'static str = "licenses_users";
    const NAME: &'static str = "LicenseUserModel";
    const FIELDS: &'static [Field] = &[
        Field::new("user_id", FieldKind::Integer),
        Field::new("license_id", FieldKind::Integer),
        Field::new("start_date", FieldKind::Date),
        Field::new("end_date", FieldKind::Date),
        Field::null("observation", FieldKind::Text),
        Field::new("off_percentage", FieldKind::Decimal),
        Field::new("credit", FieldKind::Decimal),
    ];

    fn base(&self) -> &Base {
        &self.base
    }
}

impl LicenseUser {
    /// Whether the grant covers `day`.
    #[must_use]
    pub fn is_valid_on(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }
}

/// A payment made against a license grant.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Payment {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Paid license grant.
    pub license_id: i64,
    /// Amount paid.
    pub value: Decimal,
    /// Payment day.
    pub payment_date: NaiveDate,
}

impl Model for Payment {
    const TABLE: &'static str = "payments";
    const NAME: &'static str = "PaymentModel";
    const FIELDS: &'static [Field] = &[
        Field::new("license_id", FieldKind::Integer),
        Field::new("value", FieldKind::Decimal),
        Field::new("payment_date", FieldKind::Date),
    ];

    fn base(&self) -> &Base {
        &self.base
    }
}

/// A treatment desk (chair) inside a clinic.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Desk {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Desk label.
    pub number: String,
    /// Currently free.
    pub vacancy: bool,
    /// Patients served at once.
    pub capacity: i32,
    /// Free text notes.
    pub observation: Option<String>,
}

impl Model for Desk {
    const TABLE: &'static str = "desks";
    const NAME: &'static str = "DeskModel";
    const FIELDS: &'static [Field] = &[
        Field::new("number", FieldKind::Text).max_len(255),
        Field::new("vacancy", FieldKind::Boolean).defaulted(),
        Field::new("capacity", FieldKind::Integer).defaulted(),
        Field::null("observation", FieldKind::Text),
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["number"];

    fn base(&self) -> &Base {
        &self.base
    }
}

impl fmt::Display for Desk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.number)
    }
}

/// An appointment on the clinic agenda.
///
/// Patient, user and desk are denormalized labels so the agenda survives
/// deletions on the referenced tables.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Scheduler {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Appointment status.
    #[sqlx(try_from = "String")]
    pub status: SchedulerStatus,
    /// Appointment time.
    pub date: DateTime<Utc>,
    /// Free text description.
    pub description: Option<String>,
    /// Follow-up of an earlier appointment.
    pub is_return: bool,
    /// Slot blocked (professional off).
    pub is_off: bool,
    /// Why the slot is blocked.
    pub off_reason: Option<String>,
    /// Owning clinic.
    pub clinic_id: i64,
    /// Patient label.
    pub patient: String,
    /// Professional label.
    pub user: String,
    /// Desk label.
    pub desk: String,
}

impl Model for Scheduler {
    const TABLE: &'static str = "schedulers";
    const NAME: &'static str = "SchedulerModel";
    const FIELDS: &'static [Field] = &[
        Field::new("status", FieldKind::Choice(SchedulerStatus::VALUES)).defaulted(),
        Field::new("date", FieldKind::DateTime),
        Field::null("description", FieldKind::Text),
        Field::new("is_return", FieldKind::Boolean).defaulted(),
        Field::new("is_off", FieldKind::Boolean).defaulted(),
        Field::null("off_reason", FieldKind::Text),
        Field::new("clinic_id", FieldKind::Integer),
        Field::new("patient", FieldKind::Text).max_len(150),
        Field::new("user", FieldKind::Text).max_len(150),
        Field::new("desk", FieldKind::Text).max_len(150),
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["patient", "user", "desk"];

    fn base(&self) -> &Base {
        &self.base
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.date, self.status)
    }
}

/// A public holiday.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Holiday {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Holiday date.
    pub date: DateTime<Utc>,
    /// Holiday name.
    pub name: String,
    /// Holiday type (e.g. national, optional).
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    /// Scope (national, state, city).
    pub level: String,
}

impl Model for Holiday {
    const TABLE: &'static str = "holidays";
    const NAME: &'static str = "HolidayModel";
    const FIELDS: &'static [Field] = &[
        Field::new("date", FieldKind::DateTime),
        Field::new("name", FieldKind::Text).max_len(100),
        Field::new("type", FieldKind::Text).max_len(100),
        Field::new("level", FieldKind::Text).max_len(100),
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["name"];

    fn base(&self) -> &Base {
        &self.base
    }
}

impl fmt::Display for Holiday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.date, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn license_grant_validity_is_inclusive() {
        let (Some(start), Some(end), Some(after)) = (
            NaiveDate::from_ymd_opt(2024, 1, 1),
            NaiveDate::from_ymd_opt(2024, 12, 31),
            NaiveDate::from_ymd_opt(2025, 1, 1),
        ) else {
            unreachable!("valid dates");
        };
        let grant = LicenseUser {
            base: Base {
                id: 1,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                deleted: false,
            },
            user_id: 1,
            license_id: 1,
            start_date: start,
            end_date: end,
            observation: None,
            off_percentage: Decimal::ZERO,
            credit: Decimal::ZERO,
        };
        assert!(grant.is_valid_on(start));
        assert!(grant.is_valid_on(end));
        assert!(!grant.is_valid_on(after));
    }

    #[test]
    fn clinic_display_mirrors_stored_flags() {
        let clinic = Clinic {
            base: Base {
                id: 1,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                deleted: false,
            },
            head_quarter_id: None,
            company_name: "Sorriso".to_string(),
            company_register_number: "123".to_string(),
            legal_entity: true,
            address: "Rua A".to_string(),
            subdomain: "sorriso".to_string(),
            logo_path: None,
        };
        assert_eq!(clinic.to_string(), "Sorriso - true");
    }
}
