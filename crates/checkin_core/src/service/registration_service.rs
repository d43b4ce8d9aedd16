//! Registration and attendance use-case service.
//!
//! # Responsibility
//! - Provide register/list/lookup/count entry points for core callers.
//! - Guard the `Registered -> Attended` transition.
//! - Collapse repository errors into the caller-facing error kinds.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Log events carry ids and outcomes only, never attendee names or emails.

use crate::model::registration::{
    AttendanceCounts, NewRegistration, Registration, RegistrationId, RegistrationValidationError,
};
use crate::repo::registration_repo::{
    DuplicateField, RegistrationListQuery, RegistrationRepository, RepoError,
};
use crate::token::ScannedToken;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Caller-facing error for registration and attendance use-cases.
#[derive(Debug)]
pub enum RegistrationError {
    /// Missing or blank input; the client must resubmit.
    Validation(RegistrationValidationError),
    /// Email or roll already registered; the client must correct input.
    Duplicate(DuplicateField),
    /// No registration carries this id (corrupt or foreign token).
    NotFound(RegistrationId),
    /// Token is valid but was already used. Informational, not a fault.
    AlreadyMarked(RegistrationId),
    /// Underlying storage failure.
    Persistence(RepoError),
    /// The store's connection lock was poisoned by a panicking writer.
    StoreUnavailable,
}

impl RegistrationError {
    /// Whether the error is caused by the caller's input rather than by the
    /// system.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Persistence(_) | Self::StoreUnavailable)
    }
}

impl Display for RegistrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Duplicate(field) => write!(f, "this {field} is already registered"),
            Self::NotFound(id) => write!(f, "registration not found: {id}"),
            Self::AlreadyMarked(id) => {
                write!(f, "attendance already marked for registration {id}")
            }
            Self::Persistence(err) => write!(f, "storage failure: {err}"),
            Self::StoreUnavailable => write!(f, "registration store is unavailable"),
        }
    }
}

impl Error for RegistrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Persistence(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for RegistrationError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::Duplicate(field) => Self::Duplicate(field),
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::AlreadyMarked(id) => Self::AlreadyMarked(id),
            other => Self::Persistence(other),
        }
    }
}

impl From<RegistrationValidationError> for RegistrationError {
    fn from(value: RegistrationValidationError) -> Self {
        Self::Validation(value)
    }
}

pub type ServiceResult<T> = Result<T, RegistrationError>;

/// Use-case service wrapper for registration and attendance operations.
pub struct RegistrationService<R: RegistrationRepository> {
    repo: R,
}

impl<R: RegistrationRepository> RegistrationService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a new attendee.
    ///
    /// # Contract
    /// - Rejects blank fields with `Validation`.
    /// - Rejects an existing email or roll with `Duplicate`; the store is not
    ///   mutated.
    /// - Assigns `max(id) + 1` (or `1`) and persists before returning.
    pub fn register(&self, input: &NewRegistration) -> ServiceResult<Registration> {
        if let Err(err) = input.validate() {
            warn!(
                "event=registration_create module=service status=rejected reason=validation field={}",
                err.field()
            );
            return Err(err.into());
        }

        match self.repo.insert_registration(input) {
            Ok(registration) => {
                info!(
                    "event=registration_create module=service status=ok id={}",
                    registration.id
                );
                Ok(registration)
            }
            Err(RepoError::Duplicate(field)) => {
                warn!(
                    "event=registration_create module=service status=rejected reason=duplicate field={field}"
                );
                Err(RegistrationError::Duplicate(field))
            }
            Err(err) => {
                error!(
                    "event=registration_create module=service status=error error={err}"
                );
                Err(err.into())
            }
        }
    }

    /// Lists registrations in insertion order.
    pub fn list(&self, query: &RegistrationListQuery) -> ServiceResult<Vec<Registration>> {
        Ok(self.repo.list_registrations(query)?)
    }

    /// Looks up one registration by exact id.
    pub fn find_by_id(&self, id: RegistrationId) -> ServiceResult<Option<Registration>> {
        Ok(self.repo.get_registration(id)?)
    }

    /// Returns `(total registered, total attended)` over current records.
    pub fn counts(&self) -> ServiceResult<AttendanceCounts> {
        Ok(self.repo.count_registrations()?)
    }

    /// Performs the one-way attendance transition.
    ///
    /// # Contract
    /// - Unknown id: `NotFound`.
    /// - Already attended: `AlreadyMarked`; the flag stays `true`.
    /// - Otherwise flips the flag, stamps `attended_at`, and returns the
    ///   updated record. Of any number of concurrent calls for one id,
    ///   exactly one succeeds.
    pub fn mark_attendance(&self, id: RegistrationId) -> ServiceResult<Registration> {
        match self.repo.mark_attended(id) {
            Ok(registration) => {
                info!("event=attendance_mark module=service status=ok id={id}");
                Ok(registration)
            }
            Err(RepoError::AlreadyMarked(id)) => {
                info!("event=attendance_mark module=service status=already_marked id={id}");
                Err(RegistrationError::AlreadyMarked(id))
            }
            Err(RepoError::NotFound(id)) => {
                warn!("event=attendance_mark module=service status=not_found id={id}");
                Err(RegistrationError::NotFound(id))
            }
            Err(err) => {
                error!("event=attendance_mark module=service status=error id={id} error={err}");
                Err(err.into())
            }
        }
    }

    /// Marks attendance for a decoded scan payload.
    pub fn mark_scanned(&self, token: &ScannedToken) -> ServiceResult<Registration> {
        self.mark_attendance(token.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// In-memory repository used to check service error mapping without SQLite.
    #[derive(Default)]
    struct FakeRepo {
        rows: RefCell<Vec<Registration>>,
    }

    impl RegistrationRepository for FakeRepo {
        fn insert_registration(&self, input: &NewRegistration) -> Result<Registration, RepoError> {
            let mut rows = self.rows.borrow_mut();
            if rows.iter().any(|row| row.email == input.email) {
                return Err(RepoError::Duplicate(DuplicateField::Email));
            }
            if rows.iter().any(|row| row.roll == input.roll) {
                return Err(RepoError::Duplicate(DuplicateField::Roll));
            }
            let id = rows.iter().map(|row| row.id).max().unwrap_or(0) + 1;
            let row = Registration {
                id,
                name: input.name.clone(),
                email: input.email.clone(),
                roll: input.roll.clone(),
                attended: false,
                registered_at: 0,
                attended_at: None,
            };
            rows.push(row.clone());
            Ok(row)
        }

        fn get_registration(&self, id: RegistrationId) -> Result<Option<Registration>, RepoError> {
            Ok(self.rows.borrow().iter().find(|row| row.id == id).cloned())
        }

        fn list_registrations(
            &self,
            _query: &RegistrationListQuery,
        ) -> Result<Vec<Registration>, RepoError> {
            Ok(self.rows.borrow().clone())
        }

        fn count_registrations(&self) -> Result<AttendanceCounts, RepoError> {
            let rows = self.rows.borrow();
            Ok(AttendanceCounts {
                total_registered: rows.len() as u64,
                total_attended: rows.iter().filter(|row| row.attended).count() as u64,
            })
        }

        fn mark_attended(&self, id: RegistrationId) -> Result<Registration, RepoError> {
            let mut rows = self.rows.borrow_mut();
            let row = rows
                .iter_mut()
                .find(|row| row.id == id)
                .ok_or(RepoError::NotFound(id))?;
            if row.attended {
                return Err(RepoError::AlreadyMarked(id));
            }
            row.attended = true;
            row.attended_at = Some(1);
            Ok(row.clone())
        }
    }

    #[test]
    fn register_rejects_blank_input_before_touching_repo() {
        let service = RegistrationService::new(FakeRepo::default());
        let err = service
            .register(&NewRegistration::new("Alice", "", "R1"))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::Validation(RegistrationValidationError::EmptyEmail)
        ));
        assert_eq!(service.counts().unwrap().total_registered, 0);
    }

    #[test]
    fn mark_scanned_uses_token_id() {
        let service = RegistrationService::new(FakeRepo::default());
        let created = service
            .register(&NewRegistration::new("Alice", "a@x.com", "R1"))
            .unwrap();

        let marked = service.mark_scanned(&ScannedToken::from_id(created.id).unwrap()).unwrap();
        assert!(marked.attended);

        let err = service
            .mark_scanned(&ScannedToken::from_id(created.id).unwrap())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::AlreadyMarked(id) if id == created.id));
        assert!(err.is_user_facing());
    }

    #[test]
    fn storage_failures_are_not_user_facing() {
        let err = RegistrationError::from(RepoError::InvalidData("bad row".to_string()));
        assert!(matches!(err, RegistrationError::Persistence(_)));
        assert!(!err.is_user_facing());
        assert!(!RegistrationError::StoreUnavailable.is_user_facing());
    }
}
