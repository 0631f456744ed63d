//! Local habit store: connection handle and schema.
//!
//! # Responsibility
//! - Hand out one migrated connection per `Database`, opened and closed by
//!   the caller.
//! - Keep the schema user-scoped so repositories can filter every query by
//!   the signed-in user.
//!
//! # Invariants
//! - A `Database` is never returned before the schema reaches
//!   `migrations::latest_version()`.
//! - A store written by a newer binary is refused, not downgraded.
//! - There is no process-global connection.
//!
//! # See also
//! - repo/habit_repo.rs

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::Database;

pub type DbResult<T> = Result<T, DbError>;

/// Failure to open or migrate the habit store.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The store was migrated by a newer binary.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// A data table has no `user_id` column.
    MissingUserScope { table: &'static str },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "habit store is at schema {db_version}; this build reads up to {latest_supported}"
            ),
            Self::MissingUserScope { table } => {
                write!(f, "habit store table `{table}` is not scoped by user_id")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
