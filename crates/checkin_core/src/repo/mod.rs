//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `NewRegistration::validate()` before
//!   persistence.
//! - Repository APIs return semantic errors (`Duplicate`, `NotFound`,
//!   `AlreadyMarked`) in addition to DB transport errors.

pub mod registration_repo;
