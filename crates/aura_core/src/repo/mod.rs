//! Persistence adapter contracts and implementations.
//!
//! # Responsibility
//! - Define use-case oriented habit persistence operations.
//! - Isolate SQLite query details from services and the controller.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`AuthenticationRequired`,
//!   `NotFound`) in addition to DB transport errors.

pub mod habit_repo;
