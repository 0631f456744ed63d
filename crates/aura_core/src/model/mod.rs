//! Habit tracker domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own the calendar key formats shared with storage and the assistant.
//!
//! # Invariants
//! - Habits are identified by a stable, never reused `HabitId`.
//! - Completion and month keys always use zero-padded ISO strings.

pub mod action;
pub mod calendar;
pub mod habit;
pub mod record;
