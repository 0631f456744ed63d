//! Habit tracker use-case service.
//!
//! # Responsibility
//! - Own the resident month and route every change through the mutation
//!   controller and the injected repository.
//! - Run natural-language commands: interpret, resolve, apply.
//!
//! # Invariants
//! - Direct edits and resolved commands share one write path.
//! - A persistence failure rolls the change back and is reported, never
//!   retried.
//! - `run_command` always yields a message.
//! - A completion logged for another month is written to that month's
//!   record; the resident month is resident again afterwards.
//!
//! # See also
//! - controller.rs
//! - resolver.rs

use crate::controller::{ApplyError, MutationController};
use crate::error::ErrorKind;
use crate::interpreter::{CommandInterpreter, CommandResult, LanguageService};
use crate::model::action::PendingAction;
use crate::model::calendar::{DateKey, MonthKey};
use crate::model::habit::{Habit, HabitId, HabitIdSource};
use crate::model::record::MonthlyRecord;
use crate::repo::habit_repo::{persist_mutation, HabitRepository, RepoError};
use crate::resolver::{resolve, ResolveContext};
use crate::store::{MutationError, StoreMutation};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Habits a brand-new month starts with when seeding is requested.
pub const STARTER_HABITS: [&str; 3] = [
    "Read for 15 minutes",
    "Morning walk",
    "Drink 8 glasses of water",
];

const NOT_SAVED_SUFFIX: &str = "(Couldn't save that change, so it was undone.)";

/// Failure of a tracker operation.
#[derive(Debug)]
pub enum TrackerError {
    /// Local state refused the change; nothing was persisted.
    Rejected(MutationError),
    /// Persistence failed; the change was rolled back.
    Repo(RepoError),
    CapReached { cap: usize },
}

impl Display for TrackerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::CapReached { cap } => write!(f, "You can only track {cap} habits at a time."),
        }
    }
}

impl Error for TrackerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Rejected(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::CapReached { .. } => None,
        }
    }
}

impl TrackerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Rejected(err) => err.kind(),
            Self::Repo(err) => err.kind(),
            Self::CapReached { .. } => ErrorKind::ValidationFailed,
        }
    }
}

impl From<RepoError> for TrackerError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ApplyError<RepoError>> for TrackerError {
    fn from(value: ApplyError<RepoError>) -> Self {
        match value {
            ApplyError::Rejected(err) => Self::Rejected(err),
            ApplyError::Persistence(err) => Self::Repo(err),
        }
    }
}

/// User-facing result of one natural-language command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub message: String,
    /// Whether the command changed (and persisted) state.
    pub applied: bool,
    /// Category of a refusal or failure.
    pub error_kind: Option<ErrorKind>,
}

impl CommandOutcome {
    fn text(message: String) -> Self {
        Self {
            message,
            applied: false,
            error_kind: None,
        }
    }
}

/// Habit tracker over an injected repository and language service.
pub struct HabitTracker<R: HabitRepository, S: LanguageService> {
    repo: R,
    interpreter: CommandInterpreter<S>,
    controller: MutationController,
    ids: HabitIdSource,
    habit_cap: usize,
}

impl<R: HabitRepository, S: LanguageService> HabitTracker<R, S> {
    /// Creates a tracker resident on an empty `month`. Call `open_month`
    /// to load persisted data.
    pub fn new(repo: R, service: S, month: MonthKey, habit_cap: usize) -> Self {
        Self {
            repo,
            interpreter: CommandInterpreter::new(service),
            controller: MutationController::new(MonthlyRecord::empty(month)),
            ids: HabitIdSource::new(),
            habit_cap: habit_cap.max(1),
        }
    }

    pub fn record(&self) -> &MonthlyRecord {
        self.controller.record()
    }

    pub fn month(&self) -> MonthKey {
        self.controller.record().month_key
    }

    pub fn habit_cap(&self) -> usize {
        self.habit_cap
    }

    /// Loads `month` from the repository and makes it resident.
    ///
    /// A month never written before loads as an empty record. Mutations
    /// still in flight for the previous month settle as no-ops.
    pub fn open_month(&mut self, month: MonthKey) -> Result<&MonthlyRecord, TrackerError> {
        let record = self.repo.get_month(month)?;
        if let Some(max_id) = record.max_habit_id() {
            self.ids.observe(max_id);
        }
        info!(
            "event=month_open module=service status=ok month={} habits={}",
            month,
            record.habits.len()
        );
        self.controller.load(record);
        Ok(self.controller.record())
    }

    /// Fills an empty resident month with the starter habits.
    ///
    /// Returns how many habits were added; a month that already has habits
    /// is left alone.
    pub fn seed_starter_habits(&mut self) -> Result<usize, TrackerError> {
        if !self.record().habits.is_empty() {
            return Ok(0);
        }
        let mut added = 0;
        for name in STARTER_HABITS.iter().take(self.habit_cap) {
            let habit = Habit::new(self.ids.next_id(), *name);
            self.apply(StoreMutation::AppendHabit(habit))?;
            added += 1;
        }
        Ok(added)
    }

    /// Appends a habit with an empty name, ready for inline editing.
    pub fn add_blank_habit(&mut self) -> Result<HabitId, TrackerError> {
        if self.record().habits.len() >= self.habit_cap {
            return Err(TrackerError::CapReached {
                cap: self.habit_cap,
            });
        }
        let habit = Habit::new(self.ids.next_id(), "");
        let id = habit.id;
        self.apply(StoreMutation::AppendHabit(habit))?;
        Ok(id)
    }

    /// Flips one day for one habit; returns the new completion state.
    pub fn toggle_completion(&mut self, habit_id: HabitId, date: DateKey) -> Result<bool, TrackerError> {
        self.apply(StoreMutation::ToggleCompletion { habit_id, date })?;
        Ok(self
            .record()
            .find_habit(habit_id)
            .is_some_and(|habit| habit.is_completed(date)))
    }

    /// Renames a habit. Empty names are allowed while editing.
    pub fn rename_habit(&mut self, habit_id: HabitId, name: &str) -> Result<(), TrackerError> {
        self.apply(StoreMutation::RenameHabit {
            habit_id,
            name: name.to_string(),
        })
    }

    pub fn delete_habit(&mut self, habit_id: HabitId) -> Result<(), TrackerError> {
        self.apply(StoreMutation::RemoveHabit { habit_id })
    }

    pub fn set_note(&mut self, text: &str) -> Result<(), TrackerError> {
        self.apply(StoreMutation::SetNote(text.to_string()))
    }

    pub fn set_reflection(&mut self, text: &str) -> Result<(), TrackerError> {
        self.apply(StoreMutation::SetReflection(text.to_string()))
    }

    /// Interprets `utterance`, resolves the action and applies it.
    pub fn run_command(&mut self, utterance: &str, today: DateKey) -> CommandOutcome {
        let action = match self
            .interpreter
            .interpret(utterance, self.controller.record(), today)
        {
            CommandResult::Text(text) => return CommandOutcome::text(text),
            CommandResult::Action(action) => action,
        };

        let target = match logged_month(&action, today) {
            Some(month) if month != self.month() => month,
            _ => return self.resolve_and_apply(&action, today),
        };

        let resident = self.controller.record().clone();
        if let Err(err) = self.open_month(target).map(|_| ()) {
            warn!(
                "event=command_run module=service status=error kind={} month={} error_kind={}",
                action.log_label(),
                target,
                err.kind()
            );
            return CommandOutcome {
                message: format!("Couldn't open {target} to log that."),
                applied: false,
                error_kind: Some(err.kind()),
            };
        }
        let outcome = self.resolve_and_apply(&action, today);
        self.controller.load(resident);
        outcome
    }

    fn resolve_and_apply(&mut self, action: &PendingAction, today: DateKey) -> CommandOutcome {
        let ctx = ResolveContext {
            today,
            habit_cap: self.habit_cap,
            ids: &self.ids,
        };
        let resolution = resolve(action, self.controller.record(), &ctx);
        let Some(mutation) = resolution.mutation else {
            info!(
                "event=command_run module=service status=rejected kind={} error_kind={}",
                action.log_label(),
                resolution
                    .rejection
                    .map(ErrorKind::as_str)
                    .unwrap_or("none")
            );
            return CommandOutcome {
                message: resolution.message,
                applied: false,
                error_kind: resolution.rejection,
            };
        };

        match self.apply(mutation) {
            Ok(()) => CommandOutcome {
                message: resolution.message,
                applied: true,
                error_kind: None,
            },
            Err(err) => CommandOutcome {
                message: format!("{} {NOT_SAVED_SUFFIX}", resolution.message),
                applied: false,
                error_kind: Some(err.kind()),
            },
        }
    }

    fn apply(&mut self, mutation: StoreMutation) -> Result<(), TrackerError> {
        let repo = &self.repo;
        self.controller
            .apply(mutation, |mutation, after| {
                persist_mutation(repo, mutation, after)
            })
            .map_err(TrackerError::from)
    }
}

/// Month a completion lands in, for actions that log one.
fn logged_month(action: &PendingAction, today: DateKey) -> Option<MonthKey> {
    match action {
        PendingAction::LogHabitCompletion { date, .. } => Some(date.unwrap_or(today).month()),
        _ => None,
    }
}
