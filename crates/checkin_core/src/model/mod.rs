//! Domain model for attendee registration and attendance.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//!
//! # Invariants
//! - Every registration is identified by a stable integer `RegistrationId`.
//! - Registrations are never deleted; attendance is a one-way flag.

pub mod registration;
