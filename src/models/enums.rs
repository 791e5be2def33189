//! Enumerated column values.
//!
//! Stored as their uppercase string form in `VARCHAR` columns and decoded
//! through [`TryFrom<String>`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// A stored value that does not belong to the enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} value: {value}")]
pub struct ParseEnumError {
    /// Enum name.
    pub kind: &'static str,
    /// Offending value.
    pub value: String,
}

/// Patient gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gender {
    /// Male.
    M,
    /// Female.
    F,
    /// Other.
    #[default]
    O,
}

/// Permission action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    /// Create records.
    Create,
    /// Update records.
    Update,
    /// Delete records.
    Delete,
    /// Read records.
    #[default]
    View,
}

/// User interface theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Theme {
    /// Light theme.
    #[default]
    Light,
    /// Dark theme.
    Dark,
}

/// Appointment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerStatus {
    /// Created, waiting for the patient to confirm.
    #[default]
    WaitingConfirmation,
    /// Confirmed by the patient.
    Confirmed,
    /// Canceled.
    Canceled,
    /// Appointment happened.
    Done,
    /// Patient is in the waiting room.
    Waiting,
}

macro_rules! string_enum {
    ($ty:ident, $name:literal, { $($variant:ident => $value:literal),+ $(,)? }) => {
        impl $ty {
            /// Every accepted stored value.
            pub const VALUES: &'static [&'static str] = &[$($value),+];

            /// Stored string form.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $value),+
                }
            }
        }

        impl TryFrom<String> for $ty {
            type Error = ParseEnumError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                match value.as_str() {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(ParseEnumError { kind: $name, value }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(Gender, "gender", { M => "M", F => "F", O => "O" });
string_enum!(Action, "action", {
    Create => "CREATE",
    Update => "UPDATE",
    Delete => "DELETE",
    View => "VIEW",
});
string_enum!(Theme, "theme", { Light => "LIGHT", Dark => "DARK" });
string_enum!(SchedulerStatus, "scheduler status", {
    WaitingConfirmation => "WAITING_CONFIRMATION",
    Confirmed => "CONFIRMED",
    Canceled => "CANCELED",
    Done => "DONE",
    Waiting => "WAITING",
});
