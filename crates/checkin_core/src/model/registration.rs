//! Registration domain model.
//!
//! # Responsibility
//! - Define the persisted attendee record and its attendance state machine.
//! - Validate registration input before it reaches persistence.
//!
//! # Invariants
//! - `id` is assigned once by the store and never reused.
//! - `attended` only moves from `false` to `true`.
//! - `attended_at` is set exactly when `attended` is `true`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable identifier assigned to a registration at creation.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type RegistrationId = i64;

/// Attendance lifecycle of a single registration.
///
/// `Attended` is terminal: no operation leads out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceState {
    /// Registered but not yet scanned at the venue.
    Registered,
    /// Token scanned and attendance recorded.
    Attended,
}

/// Canonical persisted attendee record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: RegistrationId,
    pub name: String,
    /// Unique across all registrations, compared exactly as presented.
    pub email: String,
    /// Unique roll/identifier code, compared exactly as presented.
    pub roll: String,
    pub attended: bool,
    /// Unix epoch milliseconds, stamped by the data layer.
    pub registered_at: i64,
    /// Unix epoch milliseconds of the attendance transition.
    pub attended_at: Option<i64>,
}

impl Registration {
    /// Returns the attendance state derived from the persisted flag.
    pub fn state(&self) -> AttendanceState {
        if self.attended {
            AttendanceState::Attended
        } else {
            AttendanceState::Registered
        }
    }
}

/// Registration input as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRegistration {
    pub name: String,
    pub email: String,
    pub roll: String,
}

impl NewRegistration {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        roll: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            roll: roll.into(),
        }
    }

    /// Checks that every field carries non-blank text.
    ///
    /// Values are not trimmed or case-folded; uniqueness is checked on the
    /// value exactly as presented.
    pub fn validate(&self) -> Result<(), RegistrationValidationError> {
        if is_blank(&self.name) {
            return Err(RegistrationValidationError::EmptyName);
        }
        if is_blank(&self.email) {
            return Err(RegistrationValidationError::EmptyEmail);
        }
        if is_blank(&self.roll) {
            return Err(RegistrationValidationError::EmptyRoll);
        }
        Ok(())
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Validation failure for registration input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationValidationError {
    EmptyName,
    EmptyEmail,
    EmptyRoll,
}

impl RegistrationValidationError {
    /// Name of the offending input field.
    pub fn field(&self) -> &'static str {
        match self {
            Self::EmptyName => "name",
            Self::EmptyEmail => "email",
            Self::EmptyRoll => "roll",
        }
    }
}

impl Display for RegistrationValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} is required and cannot be blank", self.field())
    }
}

impl Error for RegistrationValidationError {}

/// Aggregate counts for the admin view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceCounts {
    pub total_registered: u64,
    pub total_attended: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(attended: bool) -> Registration {
        Registration {
            id: 1,
            name: "Alice".to_string(),
            email: "a@x.com".to_string(),
            roll: "R1".to_string(),
            attended,
            registered_at: 1_000,
            attended_at: attended.then_some(2_000),
        }
    }

    #[test]
    fn state_follows_attended_flag() {
        assert_eq!(registration(false).state(), AttendanceState::Registered);
        assert_eq!(registration(true).state(), AttendanceState::Attended);
    }

    #[test]
    fn validate_reports_first_blank_field() {
        assert_eq!(
            NewRegistration::new("", "a@x.com", "R1").validate(),
            Err(RegistrationValidationError::EmptyName)
        );
        assert_eq!(
            NewRegistration::new("Alice", "   ", "R1").validate(),
            Err(RegistrationValidationError::EmptyEmail)
        );
        assert_eq!(
            NewRegistration::new("Alice", "a@x.com", "\t").validate(),
            Err(RegistrationValidationError::EmptyRoll)
        );
        assert!(NewRegistration::new("Alice", "a@x.com", "R1")
            .validate()
            .is_ok());
    }

    #[test]
    fn registration_serializes_with_camel_case_keys() {
        let value = serde_json::to_value(registration(true)).unwrap();
        assert_eq!(value["registeredAt"], 1_000);
        assert_eq!(value["attendedAt"], 2_000);
        assert_eq!(value["attended"], true);
    }

    #[test]
    fn counts_serialize_with_admin_view_keys() {
        let counts = AttendanceCounts {
            total_registered: 3,
            total_attended: 1,
        };
        let value = serde_json::to_value(counts).unwrap();
        assert_eq!(value["totalRegistered"], 3);
        assert_eq!(value["totalAttended"], 1);
    }
}
