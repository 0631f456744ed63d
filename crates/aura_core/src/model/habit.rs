//! Habit domain model.
//!
//! # Responsibility
//! - Define the tracked habit and its per-day completion map.
//! - Define the explicit patch shape accepted by habit updates.
//!
//! # Invariants
//! - `id` is stable for the habit lifetime and never reused.
//! - A date present in `completions` always maps to `true`; clearing a
//!   completion removes the key.
//!
//! # See also
//! - model/record.rs

use crate::model::calendar::DateKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque habit identifier: epoch milliseconds at creation time.
pub type HabitId = i64;

/// Per-day completion map. Only `true` values are ever stored.
pub type Completions = BTreeMap<DateKey, bool>;

/// Validation error for habit invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HabitValidationError {
    /// A completion entry carries `false` instead of being absent.
    ExplicitFalseCompletion { habit_id: HabitId, date: DateKey },
    /// Identifier is not a positive timestamp.
    InvalidId(HabitId),
}

impl Display for HabitValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExplicitFalseCompletion { habit_id, date } => write!(
                f,
                "habit {habit_id} stores an explicit false completion for {date}"
            ),
            Self::InvalidId(id) => write!(f, "invalid habit id {id}"),
        }
    }
}

impl Error for HabitValidationError {}

/// Tracked habit with its completion history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    /// Display name. May be empty while the user is still typing it.
    pub name: String,
    #[serde(default)]
    pub completions: Completions,
}

impl Habit {
    /// Creates a habit with no completions.
    pub fn new(id: HabitId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            completions: Completions::new(),
        }
    }

    pub fn is_completed(&self, date: DateKey) -> bool {
        self.completions.contains_key(&date)
    }

    /// Marks `date` completed. Re-marking an already completed date leaves
    /// the habit unchanged.
    pub fn mark_completed(&mut self, date: DateKey) {
        self.completions.insert(date, true);
    }

    /// Flips completion for `date` and returns the new state.
    pub fn toggle_completion(&mut self, date: DateKey) -> bool {
        if self.completions.remove(&date).is_some() {
            false
        } else {
            self.completions.insert(date, true);
            true
        }
    }

    /// Number of completed days, used for month summaries.
    pub fn completed_days(&self) -> usize {
        self.completions.len()
    }

    /// Checks the presence-only completion invariant and id shape.
    pub fn validate(&self) -> Result<(), HabitValidationError> {
        if self.id <= 0 {
            return Err(HabitValidationError::InvalidId(self.id));
        }
        if let Some((date, _)) = self.completions.iter().find(|(_, done)| !**done) {
            return Err(HabitValidationError::ExplicitFalseCompletion {
                habit_id: self.id,
                date: *date,
            });
        }
        Ok(())
    }

    /// Applies a patch in place, touching only the fields it names.
    pub fn apply_patch(&mut self, patch: &HabitPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(completions) = &patch.completions {
            self.completions = completions.clone();
        }
    }
}

/// Partial update for a habit. Fields left as `None` are not written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HabitPatch {
    pub name: Option<String>,
    pub completions: Option<Completions>,
}

impl HabitPatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            completions: None,
        }
    }

    pub fn completions(completions: Completions) -> Self {
        Self {
            name: None,
            completions: Some(completions),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.completions.is_none()
    }
}

/// Hands out strictly increasing creation-time ids.
///
/// Ids follow the wall clock in milliseconds but never repeat within one
/// source, even when two habits are created in the same millisecond.
#[derive(Debug, Default)]
pub struct HabitIdSource {
    last: AtomicI64,
}

impl HabitIdSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures every id handed out afterwards is greater than `seen`.
    pub fn observe(&self, seen: HabitId) {
        self.last.fetch_max(seen, Ordering::SeqCst);
    }

    pub fn next_id(&self) -> HabitId {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(1, |elapsed| elapsed.as_millis() as i64);
        let mut current = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(current + 1);
            match self.last.compare_exchange(
                current,
                candidate,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }
}
