//! Habit store mutations.
//!
//! # Responsibility
//! - Describe every change the resident monthly record can undergo as data.
//! - Apply one change deterministically to a record.
//!
//! # Invariants
//! - `apply` is all-or-nothing: on error the record is untouched.
//! - Applying the same mutation to equal records yields equal records, so a
//!   mutation can be replayed after a rollback.

use crate::error::ErrorKind;
use crate::model::calendar::DateKey;
use crate::model::habit::{Habit, HabitId};
use crate::model::record::MonthlyRecord;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One change to the resident monthly record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreMutation {
    /// Adds a habit at the end of the list.
    AppendHabit(Habit),
    /// Marks a day completed; no-op when already completed.
    SetCompletion { habit_id: HabitId, date: DateKey },
    /// Flips a day between completed and not completed.
    ToggleCompletion { habit_id: HabitId, date: DateKey },
    RenameHabit { habit_id: HabitId, name: String },
    RemoveHabit { habit_id: HabitId },
    /// Appends a `- line` bullet to the note.
    AppendNoteLine(String),
    SetNote(String),
    /// Replaces the reflection wholesale.
    SetReflection(String),
}

/// Mutation that cannot be applied to the current record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    HabitNotFound(HabitId),
    DuplicateHabit(HabitId),
    /// Completion date lies outside the resident month.
    DateOutsideMonth { date: DateKey, month: String },
}

impl Display for MutationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HabitNotFound(id) => write!(f, "habit not found: {id}"),
            Self::DuplicateHabit(id) => write!(f, "habit already exists: {id}"),
            Self::DateOutsideMonth { date, month } => {
                write!(f, "date {date} is outside month {month}")
            }
        }
    }
}

impl Error for MutationError {}

impl MutationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::HabitNotFound(_) => ErrorKind::NotFound,
            Self::DuplicateHabit(_) | Self::DateOutsideMonth { .. } => ErrorKind::ValidationFailed,
        }
    }
}

impl StoreMutation {
    /// Applies this mutation to `record`.
    pub fn apply(&self, record: &mut MonthlyRecord) -> Result<(), MutationError> {
        match self {
            Self::AppendHabit(habit) => {
                if record.find_habit(habit.id).is_some() {
                    return Err(MutationError::DuplicateHabit(habit.id));
                }
                record.habits.push(habit.clone());
            }
            Self::SetCompletion { habit_id, date } => {
                ensure_in_month(record, *date)?;
                habit_mut(record, *habit_id)?.mark_completed(*date);
            }
            Self::ToggleCompletion { habit_id, date } => {
                ensure_in_month(record, *date)?;
                habit_mut(record, *habit_id)?.toggle_completion(*date);
            }
            Self::RenameHabit { habit_id, name } => {
                habit_mut(record, *habit_id)?.name = name.clone();
            }
            Self::RemoveHabit { habit_id } => {
                let index = record
                    .habits
                    .iter()
                    .position(|habit| habit.id == *habit_id)
                    .ok_or(MutationError::HabitNotFound(*habit_id))?;
                record.habits.remove(index);
            }
            Self::AppendNoteLine(line) => record.append_note_line(line),
            Self::SetNote(text) => record.note = text.clone(),
            Self::SetReflection(text) => record.reflection = text.clone(),
        }
        Ok(())
    }

    /// Habit affected by this mutation, when it targets one.
    pub fn touched_habit(&self) -> Option<HabitId> {
        match self {
            Self::AppendHabit(habit) => Some(habit.id),
            Self::SetCompletion { habit_id, .. }
            | Self::ToggleCompletion { habit_id, .. }
            | Self::RenameHabit { habit_id, .. }
            | Self::RemoveHabit { habit_id } => Some(*habit_id),
            Self::AppendNoteLine(_) | Self::SetNote(_) | Self::SetReflection(_) => None,
        }
    }

    /// Stable label for log lines. Never includes user text.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AppendHabit(_) => "append_habit",
            Self::SetCompletion { .. } => "set_completion",
            Self::ToggleCompletion { .. } => "toggle_completion",
            Self::RenameHabit { .. } => "rename_habit",
            Self::RemoveHabit { .. } => "remove_habit",
            Self::AppendNoteLine(_) => "append_note_line",
            Self::SetNote(_) => "set_note",
            Self::SetReflection(_) => "set_reflection",
        }
    }
}

fn habit_mut(record: &mut MonthlyRecord, id: HabitId) -> Result<&mut Habit, MutationError> {
    record
        .find_habit_mut(id)
        .ok_or(MutationError::HabitNotFound(id))
}

fn ensure_in_month(record: &MonthlyRecord, date: DateKey) -> Result<(), MutationError> {
    if record.is_in_month(date) {
        Ok(())
    } else {
        Err(MutationError::DateOutsideMonth {
            date,
            month: record.month_key.to_string(),
        })
    }
}
