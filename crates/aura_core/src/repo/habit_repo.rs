//! Habit persistence contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the per-habit, per-month note and per-month reflection
//!   operations the store is synchronized against.
//! - Translate store mutations into exactly one persistence call each.
//!
//! # Invariants
//! - Every call requires a live identity; rows are scoped to that user.
//! - Write paths validate habits before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Completion maps are stored as JSON objects keyed by `YYYY-MM-DD`.

use crate::db::DbError;
use crate::error::ErrorKind;
use crate::identity::{Identity, IdentityProvider};
use crate::model::calendar::MonthKey;
use crate::model::habit::{Completions, Habit, HabitId, HabitPatch, HabitValidationError};
use crate::model::record::MonthlyRecord;
use crate::store::StoreMutation;
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Error for habit persistence operations.
#[derive(Debug)]
pub enum RepoError {
    /// No identity is signed in.
    AuthenticationRequired,
    NotFound(HabitId),
    Validation(HabitValidationError),
    Db(DbError),
    /// Persisted row could not be decoded.
    InvalidData(String),
    /// Value could not be encoded for writing.
    Encode(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthenticationRequired => write!(f, "sign in required"),
            Self::NotFound(id) => write!(f, "habit not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted habit data: {message}"),
            Self::Encode(message) => write!(f, "habit data not writable: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthenticationRequired => ErrorKind::AuthenticationRequired,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::ValidationFailed,
            Self::Db(_) | Self::Encode(_) => ErrorKind::UpstreamUnavailable,
            Self::InvalidData(_) => ErrorKind::MalformedResponse,
        }
    }
}

impl From<HabitValidationError> for RepoError {
    fn from(value: HabitValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistence operations the habit store is reconciled against.
pub trait HabitRepository {
    /// Loads a month; a month with no rows yields an empty record.
    fn get_month(&self, month: MonthKey) -> RepoResult<MonthlyRecord>;
    /// Appends a habit at the end of the month's list.
    fn add_habit(&self, month: MonthKey, habit: &Habit) -> RepoResult<Habit>;
    /// Writes only the fields named by `patch`.
    fn update_habit(&self, id: HabitId, patch: &HabitPatch) -> RepoResult<Habit>;
    fn delete_habit(&self, id: HabitId) -> RepoResult<()>;
    fn save_note(&self, month: MonthKey, text: &str) -> RepoResult<()>;
    fn save_reflection(&self, month: MonthKey, text: &str) -> RepoResult<()>;
}

/// Persists one already-applied store mutation.
///
/// `after` is the record state right after the mutation was applied; note
/// and completion writes send the resulting full value.
pub fn persist_mutation<R: HabitRepository + ?Sized>(
    repo: &R,
    mutation: &StoreMutation,
    after: &MonthlyRecord,
) -> RepoResult<()> {
    let month = after.month_key;
    match mutation {
        StoreMutation::AppendHabit(habit) => repo.add_habit(month, habit).map(|_| ()),
        StoreMutation::SetCompletion { habit_id, .. }
        | StoreMutation::ToggleCompletion { habit_id, .. } => {
            let habit = after
                .find_habit(*habit_id)
                .ok_or(RepoError::NotFound(*habit_id))?;
            repo.update_habit(*habit_id, &HabitPatch::completions(habit.completions.clone()))
                .map(|_| ())
        }
        StoreMutation::RenameHabit { habit_id, name } => repo
            .update_habit(*habit_id, &HabitPatch::rename(name.clone()))
            .map(|_| ()),
        StoreMutation::RemoveHabit { habit_id } => repo.delete_habit(*habit_id),
        StoreMutation::AppendNoteLine(_) | StoreMutation::SetNote(_) => {
            repo.save_note(month, &after.note)
        }
        StoreMutation::SetReflection(_) => repo.save_reflection(month, &after.reflection),
    }
}

const HABIT_SELECT_SQL: &str = "SELECT id, name, completions_json FROM habits";

/// SQLite-backed habit repository scoped to the current identity.
pub struct SqliteHabitRepository<'a> {
    conn: &'a Connection,
    identity: &'a dyn IdentityProvider,
}

impl<'a> SqliteHabitRepository<'a> {
    pub fn new(conn: &'a Connection, identity: &'a dyn IdentityProvider) -> Self {
        Self { conn, identity }
    }

    fn require_identity(&self, operation: &'static str) -> RepoResult<Identity> {
        self.identity.current_identity().ok_or_else(|| {
            warn!("event=repo_call module=repo status=denied op={operation} error_code=authentication_required");
            RepoError::AuthenticationRequired
        })
    }

    fn get_habit(&self, identity: &Identity, id: HabitId) -> RepoResult<Option<Habit>> {
        let mut stmt = self.conn.prepare(&format!(
            "{HABIT_SELECT_SQL} WHERE user_id = ?1 AND id = ?2;"
        ))?;
        let mut rows = stmt.query(params![identity.user_id(), id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_habit_row(row)?)),
            None => Ok(None),
        }
    }
}

impl HabitRepository for SqliteHabitRepository<'_> {
    fn get_month(&self, month: MonthKey) -> RepoResult<MonthlyRecord> {
        let identity = self.require_identity("get_month")?;
        let month_text = month.to_string();

        let mut stmt = self.conn.prepare(&format!(
            "{HABIT_SELECT_SQL}
             WHERE user_id = ?1 AND month_key = ?2
             ORDER BY position ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params![identity.user_id(), month_text])?;
        let mut habits = Vec::new();
        while let Some(row) = rows.next()? {
            habits.push(parse_habit_row(row)?);
        }

        let entry: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT note, reflection FROM monthly_entries
                 WHERE user_id = ?1 AND month_key = ?2;",
                params![identity.user_id(), month_text],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (note, reflection) = entry.unwrap_or_default();

        debug!(
            "event=repo_call module=repo status=ok op=get_month month={month} habits={}",
            habits.len()
        );
        Ok(MonthlyRecord {
            month_key: month,
            habits,
            note,
            reflection,
        })
    }

    fn add_habit(&self, month: MonthKey, habit: &Habit) -> RepoResult<Habit> {
        let identity = self.require_identity("add_habit")?;
        habit.validate()?;

        self.conn.execute(
            "INSERT INTO habits (user_id, id, month_key, position, name, completions_json)
             VALUES (
                ?1, ?2, ?3,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM habits WHERE user_id = ?1 AND month_key = ?3),
                ?4, ?5
             );",
            params![
                identity.user_id(),
                habit.id,
                month.to_string(),
                habit.name.as_str(),
                completions_to_json(&habit.completions)?,
            ],
        )?;

        self.get_habit(&identity, habit.id)?
            .ok_or(RepoError::NotFound(habit.id))
    }

    fn update_habit(&self, id: HabitId, patch: &HabitPatch) -> RepoResult<Habit> {
        let identity = self.require_identity("update_habit")?;
        if let Some(completions) = &patch.completions {
            let mut probe = Habit::new(id, "");
            probe.completions = completions.clone();
            probe.validate()?;
        }

        let completions_json = match &patch.completions {
            Some(completions) => Some(completions_to_json(completions)?),
            None => None,
        };

        let changed = self.conn.execute(
            "UPDATE habits
             SET
                name = COALESCE(?1, name),
                completions_json = COALESCE(?2, completions_json),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE user_id = ?3 AND id = ?4;",
            params![
                patch.name.as_deref(),
                completions_json,
                identity.user_id(),
                id
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        self.get_habit(&identity, id)?.ok_or(RepoError::NotFound(id))
    }

    fn delete_habit(&self, id: HabitId) -> RepoResult<()> {
        let identity = self.require_identity("delete_habit")?;
        let changed = self.conn.execute(
            "DELETE FROM habits WHERE user_id = ?1 AND id = ?2;",
            params![identity.user_id(), id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn save_note(&self, month: MonthKey, text: &str) -> RepoResult<()> {
        let identity = self.require_identity("save_note")?;
        self.conn.execute(
            "INSERT INTO monthly_entries (user_id, month_key, note)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id, month_key) DO UPDATE SET
                note = excluded.note,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![identity.user_id(), month.to_string(), text],
        )?;
        Ok(())
    }

    fn save_reflection(&self, month: MonthKey, text: &str) -> RepoResult<()> {
        let identity = self.require_identity("save_reflection")?;
        self.conn.execute(
            "INSERT INTO monthly_entries (user_id, month_key, reflection)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id, month_key) DO UPDATE SET
                reflection = excluded.reflection,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![identity.user_id(), month.to_string(), text],
        )?;
        Ok(())
    }
}

fn parse_habit_row(row: &Row<'_>) -> RepoResult<Habit> {
    let id: HabitId = row.get("id")?;
    let completions_text: String = row.get("completions_json")?;
    let completions: Completions = serde_json::from_str(&completions_text).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid completions_json for habit {id}: {err}"
        ))
    })?;

    let habit = Habit {
        id,
        name: row.get("name")?,
        completions,
    };
    habit
        .validate()
        .map_err(|err| RepoError::InvalidData(err.to_string()))?;
    Ok(habit)
}

fn completions_to_json(completions: &Completions) -> RepoResult<String> {
    serde_json::to_string(completions)
        .map_err(|err| RepoError::Encode(format!("completions not serializable: {err}")))
}
