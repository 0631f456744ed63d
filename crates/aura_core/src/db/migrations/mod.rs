//! Versioned schema of the per-user habit store.
//!
//! Version 1 creates `habits`: one row per habit, keyed by `(user_id, id)`
//! and grouped by `month_key`. Version 2 adds `monthly_entries`, the note
//! and reflection of one user's month.
//!
//! # Invariants
//! - `version` values are strictly increasing and mirrored to
//!   `PRAGMA user_version`.
//! - Pending steps run in one transaction; a failing step leaves the store
//!   at its previous version.
//! - Every data table carries a `user_id` column. A store whose tables lost
//!   it is refused rather than read without user scoping.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "habits",
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        name: "monthly_entries",
        sql: include_str!("0002_monthly_entries.sql"),
    },
];

/// Tables whose rows belong to exactly one signed-in user.
pub const USER_SCOPED_TABLES: [&str; 2] = ["habits", "monthly_entries"];

/// Schema version this binary migrates to.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Schema version recorded in the store.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Brings the store up to `latest_version()` and returns the version reached.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<u32> {
    let found = schema_version(conn)?;
    let latest = latest_version();
    if found > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: found,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > found)
        .collect();
    if !pending.is_empty() {
        let tx = conn.transaction()?;
        for migration in &pending {
            tx.execute_batch(migration.sql)?;
            tx.pragma_update(None, "user_version", migration.version)?;
            info!(
                "event=db_migrate module=db status=ok version={} step={}",
                migration.version, migration.name
            );
        }
        tx.commit()?;
    }

    verify_user_scope(conn)?;
    Ok(latest)
}

fn verify_user_scope(conn: &Connection) -> DbResult<()> {
    for table in USER_SCOPED_TABLES {
        let scoped: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM pragma_table_info(?1) WHERE name = 'user_id');",
            [table],
            |row| row.get(0),
        )?;
        if !scoped {
            return Err(DbError::MissingUserScope { table });
        }
    }
    Ok(())
}
