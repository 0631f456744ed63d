//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level habit tracker functions to Dart via FRB.
//! - Convert every core error into an envelope with a stable error kind.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every data call names its user; blank user ids fail with
//!   `authentication_required` before the store is opened.
//! - Each call opens and closes its own store handle.

use aura_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    CommandOutcome, CoreConfig, DateKey, Database, ErrorKind, GeminiClient, HabitTracker,
    Identity, MonthKey, MonthlyRecord, SqliteHabitRepository, TrackerError,
};
use log::warn;
use std::sync::OnceLock;

static CORE_CONFIG: OnceLock<Result<CoreConfig, String>> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One habit row as rendered by the month grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitView {
    pub id: i64,
    pub name: String,
    /// Completed days as `YYYY-MM-DD`, ascending.
    pub completed_dates: Vec<String>,
}

/// Resident month as rendered by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthView {
    /// `YYYY-MM`.
    pub month_key: String,
    pub habits: Vec<HabitView>,
    pub note: String,
    pub reflection: String,
    pub days_in_month: u32,
    /// Weekday of the 1st, Sunday = 0.
    pub first_weekday: u32,
}

/// Response envelope for direct habit edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Stable snake_case error kind on failure.
    pub error_kind: Option<String>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
    /// Month state after the call; present whenever the store could be read.
    pub month: Option<MonthView>,
}

/// Response envelope for natural-language commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    /// Whether the command changed state.
    pub applied: bool,
    pub error_kind: Option<String>,
    /// Assistant reply shown to the user. Never empty.
    pub message: String,
    pub month: Option<MonthView>,
}

type FfiTracker<'a> = HabitTracker<SqliteHabitRepository<'a>, GeminiClient>;

/// Failure before or during a tracker call.
struct CallFailure {
    kind: ErrorKind,
    message: String,
    month: Option<MonthView>,
}

impl CallFailure {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            month: None,
        }
    }
}

impl HabitResponse {
    fn success(message: impl Into<String>, month: MonthView) -> Self {
        Self {
            ok: true,
            error_kind: None,
            message: message.into(),
            month: Some(month),
        }
    }

    fn failure(failure: CallFailure) -> Self {
        Self {
            ok: false,
            error_kind: Some(failure.kind.as_str().to_string()),
            message: failure.message,
            month: failure.month,
        }
    }
}

/// Loads one month for `user_id`.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - A month never written before returns an empty grid.
#[flutter_rust_bridge::frb(sync)]
pub fn habit_open_month(user_id: String, month_key: String) -> HabitResponse {
    edit_response("habit_open_month", &user_id, &month_key, "Month loaded.", |_| Ok(()))
}

/// Fills an empty month with the starter habits.
#[flutter_rust_bridge::frb(sync)]
pub fn habit_seed_starter(user_id: String, month_key: String) -> HabitResponse {
    edit_response(
        "habit_seed_starter",
        &user_id,
        &month_key,
        "Starter habits ready.",
        |tracker| tracker.seed_starter_habits().map(|_| ()),
    )
}

/// Appends a habit with an empty name for inline editing.
#[flutter_rust_bridge::frb(sync)]
pub fn habit_add_blank(user_id: String, month_key: String) -> HabitResponse {
    edit_response("habit_add_blank", &user_id, &month_key, "Habit added.", |tracker| {
        tracker.add_blank_habit().map(|_| ())
    })
}

/// Flips one day for one habit.
///
/// # FFI contract
/// - `date` must be `YYYY-MM-DD` inside `month_key`.
/// - On persistence failure the month is returned as it was before the call.
#[flutter_rust_bridge::frb(sync)]
pub fn habit_toggle(user_id: String, month_key: String, habit_id: i64, date: String) -> HabitResponse {
    let date = match DateKey::parse(&date) {
        Ok(date) => date,
        Err(err) => {
            return HabitResponse::failure(CallFailure::new(
                ErrorKind::ValidationFailed,
                format!("habit_toggle failed: {err}"),
            ))
        }
    };
    edit_response("habit_toggle", &user_id, &month_key, "Day updated.", |tracker| {
        tracker.toggle_completion(habit_id, date).map(|_| ())
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn habit_rename(user_id: String, month_key: String, habit_id: i64, name: String) -> HabitResponse {
    edit_response("habit_rename", &user_id, &month_key, "Habit renamed.", |tracker| {
        tracker.rename_habit(habit_id, &name)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn habit_delete(user_id: String, month_key: String, habit_id: i64) -> HabitResponse {
    edit_response("habit_delete", &user_id, &month_key, "Habit deleted.", |tracker| {
        tracker.delete_habit(habit_id)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn habit_set_note(user_id: String, month_key: String, text: String) -> HabitResponse {
    edit_response("habit_set_note", &user_id, &month_key, "Notes saved.", |tracker| {
        tracker.set_note(&text)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn habit_set_reflection(user_id: String, month_key: String, text: String) -> HabitResponse {
    edit_response(
        "habit_set_reflection",
        &user_id,
        &month_key,
        "Reflection saved.",
        |tracker| tracker.set_reflection(&text),
    )
}

/// Runs one natural-language command against the month containing `today`.
///
/// # FFI contract
/// - Sync call; blocks on the language service request.
/// - Never panics; `message` is always set.
/// - A missing API key yields a text reply, not a failure.
/// - A completion dated in another month is saved there; `month` still
///   shows the month containing `today`.
#[flutter_rust_bridge::frb(sync)]
pub fn habit_run_command(user_id: String, utterance: String, today: String) -> CommandResponse {
    let today = match DateKey::parse(&today) {
        Ok(today) => today,
        Err(err) => {
            return command_failure(CallFailure::new(
                ErrorKind::ValidationFailed,
                format!("habit_run_command failed: {err}"),
            ))
        }
    };

    let result = with_tracker(&user_id, today.month(), |tracker| {
        let outcome: CommandOutcome = tracker.run_command(&utterance, today);
        Ok((outcome, to_month_view(tracker.record())))
    });

    match result {
        Ok((outcome, month)) => CommandResponse {
            applied: outcome.applied,
            error_kind: outcome.error_kind.map(|kind| kind.as_str().to_string()),
            message: outcome.message,
            month: Some(month),
        },
        Err(failure) => command_failure(failure),
    }
}

fn command_failure(failure: CallFailure) -> CommandResponse {
    CommandResponse {
        applied: false,
        error_kind: Some(failure.kind.as_str().to_string()),
        message: failure.message,
        month: failure.month,
    }
}

fn edit_response(
    operation: &'static str,
    user_id: &str,
    month_key: &str,
    success_message: &str,
    edit: impl FnOnce(&mut FfiTracker<'_>) -> Result<(), TrackerError>,
) -> HabitResponse {
    let month = match MonthKey::parse(month_key) {
        Ok(month) => month,
        Err(err) => {
            return HabitResponse::failure(CallFailure::new(
                ErrorKind::ValidationFailed,
                format!("{operation} failed: {err}"),
            ))
        }
    };

    let result = with_tracker(user_id, month, |tracker| match edit(tracker) {
        Ok(()) => Ok(to_month_view(tracker.record())),
        Err(err) => {
            warn!(
                "event=ffi_call module=ffi status=error op={operation} error_kind={}",
                err.kind()
            );
            Err(CallFailure {
                kind: err.kind(),
                message: format!("{operation} failed: {err}"),
                month: Some(to_month_view(tracker.record())),
            })
        }
    });

    match result {
        Ok(view) => HabitResponse::success(success_message, view),
        Err(failure) => HabitResponse::failure(failure),
    }
}

/// Opens the store, loads `month` for `user_id` and runs `f`.
fn with_tracker<T>(
    user_id: &str,
    month: MonthKey,
    f: impl FnOnce(&mut FfiTracker<'_>) -> Result<T, CallFailure>,
) -> Result<T, CallFailure> {
    let identity = Identity::new(user_id)
        .ok_or_else(|| CallFailure::new(ErrorKind::AuthenticationRequired, "sign in required"))?;
    let config = resolve_config()
        .map_err(|err| CallFailure::new(ErrorKind::ValidationFailed, format!("config invalid: {err}")))?;
    let db = Database::open(&config.db_path).map_err(|err| {
        CallFailure::new(ErrorKind::UpstreamUnavailable, format!("store open failed: {err}"))
    })?;

    let result = {
        let repo = SqliteHabitRepository::new(db.conn(), &identity);
        let mut tracker = HabitTracker::new(
            repo,
            GeminiClient::new(&config.language),
            month,
            config.habit_cap,
        );
        match tracker.open_month(month) {
            Ok(_) => f(&mut tracker),
            Err(err) => Err(CallFailure::new(err.kind(), format!("month load failed: {err}"))),
        }
    };

    if let Err(err) = db.close() {
        warn!("event=ffi_call module=ffi status=error op=db_close error={err}");
    }
    result
}

fn resolve_config() -> Result<&'static CoreConfig, String> {
    CORE_CONFIG
        .get_or_init(|| CoreConfig::from_env().map_err(|err| err.to_string()))
        .as_ref()
        .map_err(Clone::clone)
}

fn to_month_view(record: &MonthlyRecord) -> MonthView {
    MonthView {
        month_key: record.month_key.to_string(),
        habits: record
            .habits
            .iter()
            .map(|habit| HabitView {
                id: habit.id,
                name: habit.name.clone(),
                completed_dates: habit
                    .completions
                    .keys()
                    .map(|date| date.to_string())
                    .collect(),
            })
            .collect(),
        note: record.note.clone(),
        reflection: record.reflection.clone(),
        days_in_month: record.month_key.days_in_month(),
        first_weekday: record.month_key.first_weekday(),
    }
}
