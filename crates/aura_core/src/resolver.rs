//! Action resolver: turns a typed action into a confirmation and a mutation.
//!
//! # Responsibility
//! - Validate one `PendingAction` against the resident record.
//! - Produce the user-facing message and, when allowed, one `StoreMutation`.
//!
//! # Invariants
//! - Resolution is synchronous and never touches persistence; only the
//!   returned mutation is handed on to the controller.
//! - Expected refusals (not found, cap reached, blank input) are results
//!   with `rejection` set, never errors or panics.
//! - Completions resolve against the record of the month they fall in;
//!   callers load that month first.

use crate::error::ErrorKind;
use crate::model::action::PendingAction;
use crate::model::calendar::DateKey;
use crate::model::habit::{Habit, HabitIdSource};
use crate::model::record::MonthlyRecord;
use crate::store::StoreMutation;

/// Default cap on simultaneously tracked habits.
pub const DEFAULT_HABIT_CAP: usize = 3;

/// Inputs beyond the action and state that resolution depends on.
pub struct ResolveContext<'a> {
    /// Calendar date used when an action omits its date.
    pub today: DateKey,
    pub habit_cap: usize,
    pub ids: &'a HabitIdSource,
}

/// Outcome of resolving one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub message: String,
    pub mutation: Option<StoreMutation>,
    /// Set when the action was refused.
    pub rejection: Option<ErrorKind>,
}

impl Resolution {
    fn accepted(message: impl Into<String>, mutation: StoreMutation) -> Self {
        Self {
            message: message.into(),
            mutation: Some(mutation),
            rejection: None,
        }
    }

    fn rejected(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            mutation: None,
            rejection: Some(kind),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.rejection.is_none()
    }
}

/// Resolves `action` against `state`.
pub fn resolve(action: &PendingAction, state: &MonthlyRecord, ctx: &ResolveContext<'_>) -> Resolution {
    match action {
        PendingAction::AddHabit { name } => resolve_add_habit(name, state, ctx),
        PendingAction::LogHabitCompletion { name, date } => {
            resolve_log_completion(name, date.unwrap_or(ctx.today), state)
        }
        PendingAction::AddHabitNote { note } => {
            let note = note.trim();
            if note.is_empty() {
                return Resolution::rejected(ErrorKind::ValidationFailed, "The note was empty.");
            }
            Resolution::accepted(
                "Note added to habits section.",
                StoreMutation::AppendNoteLine(note.to_string()),
            )
        }
        PendingAction::SetMonthlyReflection { reflection } => Resolution::accepted(
            "Monthly reflection has been set.",
            StoreMutation::SetReflection(reflection.clone()),
        ),
        PendingAction::Unsupported { .. } => Resolution::rejected(
            ErrorKind::ValidationFailed,
            "Sorry, I don't know how to do that.",
        ),
    }
}

fn resolve_add_habit(name: &str, state: &MonthlyRecord, ctx: &ResolveContext<'_>) -> Resolution {
    let name = name.trim();
    if name.is_empty() {
        return Resolution::rejected(ErrorKind::ValidationFailed, "A habit needs a name.");
    }
    if state.habits.len() >= ctx.habit_cap {
        return Resolution::rejected(
            ErrorKind::ValidationFailed,
            format!("You can only track {} habits at a time.", ctx.habit_cap),
        );
    }

    let habit = Habit::new(ctx.ids.next_id(), name);
    Resolution::accepted(
        format!("New habit added: \"{name}\""),
        StoreMutation::AppendHabit(habit),
    )
}

fn resolve_log_completion(name: &str, date: DateKey, state: &MonthlyRecord) -> Resolution {
    if !state.is_in_month(date) {
        return Resolution::rejected(
            ErrorKind::ValidationFailed,
            format!("{date} is outside {}.", state.month_key),
        );
    }

    match state.find_habit_by_name(name) {
        Some(habit) => Resolution::accepted(
            format!("Logged \"{}\" for {date}", habit.name),
            StoreMutation::SetCompletion {
                habit_id: habit.id,
                date,
            },
        ),
        None => Resolution::rejected(
            ErrorKind::NotFound,
            format!("Couldn't find the habit \"{}\"", name.trim()),
        ),
    }
}
