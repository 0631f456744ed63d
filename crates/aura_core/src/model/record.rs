//! Monthly record: habits, note and reflection of one calendar month.
//!
//! # Invariants
//! - Habit order is insertion order and is preserved by every mutation.
//! - A never-seen month is represented by an empty record, not an error.

use crate::model::calendar::{DateKey, MonthKey};
use crate::model::habit::{Habit, HabitId};
use serde::{Deserialize, Serialize};

/// Bullet prefix used for note lines appended by commands.
const NOTE_BULLET: &str = "- ";

/// Everything the user tracks for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRecord {
    pub month_key: MonthKey,
    pub habits: Vec<Habit>,
    pub note: String,
    pub reflection: String,
}

impl MonthlyRecord {
    /// Implicit record for a month with no stored data.
    pub fn empty(month_key: MonthKey) -> Self {
        Self {
            month_key,
            habits: Vec::new(),
            note: String::new(),
            reflection: String::new(),
        }
    }

    pub fn find_habit(&self, id: HabitId) -> Option<&Habit> {
        self.habits.iter().find(|habit| habit.id == id)
    }

    pub fn find_habit_mut(&mut self, id: HabitId) -> Option<&mut Habit> {
        self.habits.iter_mut().find(|habit| habit.id == id)
    }

    /// First habit whose name equals `name` ignoring case and surrounding
    /// whitespace. Blank names never match.
    pub fn find_habit_by_name(&self, name: &str) -> Option<&Habit> {
        let wanted = normalize_name(name);
        if wanted.is_empty() {
            return None;
        }
        self.habits
            .iter()
            .find(|habit| normalize_name(&habit.name) == wanted)
    }

    /// Appends one `- line` bullet to the note.
    pub fn append_note_line(&mut self, line: &str) {
        if self.note.is_empty() {
            self.note = format!("{NOTE_BULLET}{line}");
        } else {
            self.note.push('\n');
            self.note.push_str(NOTE_BULLET);
            self.note.push_str(line);
        }
    }

    /// Highest habit id present, used to seed id generation after a load.
    pub fn max_habit_id(&self) -> Option<HabitId> {
        self.habits.iter().map(|habit| habit.id).max()
    }

    pub fn is_in_month(&self, date: DateKey) -> bool {
        self.month_key.contains(date)
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
