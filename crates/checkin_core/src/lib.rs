//! Core domain logic for event check-in.
//! This crate is the single source of truth for registration and attendance
//! invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;
pub mod token;

pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status};
pub use model::registration::{
    AttendanceCounts, AttendanceState, NewRegistration, Registration, RegistrationId,
    RegistrationValidationError,
};
pub use repo::registration_repo::{
    DuplicateField, RegistrationListQuery, RegistrationRepository, RepoError, RepoResult,
    SqliteRegistrationRepository,
};
pub use service::registration_service::{RegistrationError, RegistrationService};
pub use store::RegistrationStore;
pub use token::{ScannedToken, TokenError, TokenPayload};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
