//! Patients, treatments, anamnesis forms and care plans.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use super::enums::Gender;
use super::{Base, Field, FieldKind, Model};

/// A patient of a clinic.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Patient {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Full name.
    pub full_name: String,
    /// Taxpayer registration number.
    pub taxpayer_id: Option<String>,
    /// Birth date.
    pub birth_date: Option<NaiveDate>,
    /// Gender.
    #[sqlx(try_from = "String")]
    pub gender: Gender,
    /// Contact phone.
    pub phone: Option<String>,
}

impl Patient {
    /// Age in whole years on `today`, counted as elapsed days / 365.
    #[must_use]
    pub fn age(&self, today: NaiveDate) -> Option<i64> {
        self.birth_date
            .map(|birth| today.signed_duration_since(birth).num_days() / 365)
    }
}

impl Model for Patient {
    const TABLE: &'static str = "patients";
    const NAME: &'static str = "PatientModel";
    const FIELDS: &'static [Field] = &[
        Field::new("full_name", FieldKind::Text).max_len(255),
        Field::null("taxpayer_id", FieldKind::Text).max_len(12),
        Field::null("birth_date", FieldKind::Date),
        Field::new("gender", FieldKind::Choice(Gender::VALUES)).defaulted(),
        Field::null("phone", FieldKind::Text).max_len(20),
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["full_name", "taxpayer_id", "phone"];

    fn base(&self) -> &Base {
        &self.base
    }
}

impl fmt::Display for Patient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// A file attached to a patient record.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Document {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Owning patient.
    pub patient_id: i64,
    /// Original file name.
    pub file_name: String,
    /// Storage path.
    pub file_path: String,
    /// Free text notes.
    pub observation: Option<String>,
}

impl Model for Document {
    const TABLE: &'static str = "documents";
    const NAME: &'static str = "DocumentModel";
    const FIELDS: &'static [Field] = &[
        Field::new("patient_id", FieldKind::Integer),
        Field::new("file_name", FieldKind::Text).max_len(255),
        Field::new("file_path", FieldKind::Text).max_len(255),
        Field::null("observation", FieldKind::Text),
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["file_name"];

    fn base(&self) -> &Base {
        &self.base
    }
}

/// A treatment offered by the clinic.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Treatment {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Treatment name.
    pub name: String,
    /// Catalogue number.
    pub number: String,
    /// Description.
    pub description: Option<String>,
    /// Cost to the clinic.
    pub cost: Decimal,
    /// Price charged.
    pub value: Decimal,
    /// Free text notes.
    pub observation: Option<String>,
}

impl Model for Treatment {
    const TABLE: &'static str = "treatments";
    const NAME: &'static str = "TreatmentModel";
    const FIELDS: &'static [Field] = &[
        Field::new("name", FieldKind::Text).max_len(255),
        Field::new("number", FieldKind::Text).max_len(255),
        Field::null("description", FieldKind::Text),
        Field::new("cost", FieldKind::Decimal),
        Field::new("value", FieldKind::Decimal),
        Field::null("observation", FieldKind::Text),
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "number"];

    fn base(&self) -> &Base {
        &self.base
    }
}

impl fmt::Display for Treatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.name, self.number)
    }
}

/// A treatment applied to a patient.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TreatmentPatient {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Treated patient.
    pub patient_id: i64,
    /// Applied treatment.
    pub treatment_id: i64,
    /// Start day.
    pub start_date: NaiveDate,
    /// End day, if finished.
    pub end_date: Option<NaiveDate>,
    /// Free text notes.
    pub observation: Option<String>,
}

impl Model for TreatmentPatient {
    const TABLE: &'static str = "treatments_patients";
    const NAME: &'static str = "TreatmentPatientModel";
    const FIELDS: &'static [Field] = &[
        Field::new("patient_id", FieldKind::Integer),
        Field::new("treatment_id", FieldKind::Integer),
        Field::new("start_date", FieldKind::Date),
        Field::null("end_date", FieldKind::Date),
        Field::null("observation", FieldKind::Text),
    ];

    fn base(&self) -> &Base {
        &self.base
    }
}

/// An urgent visit.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Urgency {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Short title.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Free text notes.
    pub observation: Option<String>,
    /// Patient attended.
    pub patient_id: i64,
    /// Visit day.
    pub date: NaiveDate,
}

impl Model for Urgency {
    const TABLE: &'static str = "urgencies";
    const NAME: &'static str = "UrgencyModel";
    const FIELDS: &'static [Field] = &[
        Field::new("name", FieldKind::Text).max_len(255),
        Field::null("description", FieldKind::Text),
        Field::null("observation", FieldKind::Text),
        Field::new("patient_id", FieldKind::Integer),
        Field::new("date", FieldKind::Date),
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["name"];

    fn base(&self) -> &Base {
        &self.base
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// An anamnesis form.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Anamnesis {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Form name.
    pub name: String,
    /// Form number.
    pub number: String,
    /// Description.
    pub description: Option<String>,
    /// Free text notes.
    pub observation: Option<String>,
}

impl Model for Anamnesis {
    const TABLE: &'static str = "anamnesis";
    const NAME: &'static str = "AnamnesisModel";
    const FIELDS: &'static [Field] = &[
        Field::new("name", FieldKind::Text).max_len(255),
        Field::new("number", FieldKind::Text).max_len(255),
        Field::null("description", FieldKind::Text),
        Field::null("observation", FieldKind::Text),
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "number"];

    fn base(&self) -> &Base {
        &self.base
    }
}

impl fmt::Display for Anamnesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.name, self.number)
    }
}

/// A question on an anamnesis form.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Question {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Owning form.
    pub anamnesis_id: i64,
    /// Question text.
    pub question: String,
    /// Rendered as a one-line input.
    pub short_question: bool,
}

impl Model for Question {
    const TABLE: &'static str = "questions";
    const NAME: &'static str = "QuestionModel";
    const FIELDS: &'static [Field] = &[
        Field::new("anamnesis_id", FieldKind::Integer),
        Field::new("question", FieldKind::Text),
        Field::new("short_question", FieldKind::Boolean).defaulted(),
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["question"];

    fn base(&self) -> &Base {
        &self.base
    }
}

/// A patient's answer to a question.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Answer {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Answered question.
    pub question_id: i64,
    /// Answering patient.
    pub patient_id: i64,
    /// Answer text.
    pub answer: String,
}

impl Model for Answer {
    const TABLE: &'static str = "answers";
    const NAME: &'static str = "AnswerModel";
    const FIELDS: &'static [Field] = &[
        Field::new("question_id", FieldKind::Integer),
        Field::new("patient_id", FieldKind::Integer),
        Field::new("answer", FieldKind::Text),
    ];

    fn base(&self) -> &Base {
        &self.base
    }
}

/// A health plan accepted by the clinic.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Plan {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Plan name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Free text notes.
    pub observation: Option<String>,
}

impl Model for Plan {
    const TABLE: &'static str = "plans";
    const NAME: &'static str = "PlanModel";
    const FIELDS: &'static [Field] = &[
        Field::new("name", FieldKind::Text).max_len(255),
        Field::null("description", FieldKind::Text),
        Field::null("observation", FieldKind::Text),
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["name"];

    fn base(&self) -> &Base {
        &self.base
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A medical specialty.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Specialty {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Specialty name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
}

impl Model for Specialty {
    const TABLE: &'static str = "specialties";
    const NAME: &'static str = "SpecialtyModel";
    const FIELDS: &'static [Field] = &[
        Field::new("name", FieldKind::Text).max_len(255),
        Field::null("description", FieldKind::Text),
    ];
    const SEARCH_FIELDS: &'static [&'static str] = &["name"];

    fn base(&self) -> &Base {
        &self.base
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A treatment covered by a plan.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PlanTreatment {
    /// Shared columns.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: Base,
    /// Covering plan.
    pub plan_id: i64,
    /// Covered treatment.
    pub treatment_id: i64,
    /// Free text notes.
    pub observation: Option<String>,
}

impl Model for PlanTreatment {
    const TABLE: &'static str = "plans_treatments";
    const NAME: &'static str = "PlanTreatmentModel";
    const FIELDS: &'static [Field] = &[
        Field::new("plan_id", FieldKind::Integer),
        Field::new("treatment_id", FieldKind::Integer),
        Field::null("observation", FieldKind::Text),
    ];

    fn base(&self) -> &Base {
        &self.base
    }
}
