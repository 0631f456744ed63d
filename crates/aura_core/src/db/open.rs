//! Lifecycle of the local habit store connection.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections and configure pragmas.
//! - Run migrations before handing out a usable handle.
//! - Close the connection explicitly at shutdown.
//!
//! # Invariants
//! - An open `Database` always has `foreign_keys=ON` and the latest schema.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open, migrated connection to the local habit store.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) a store file and applies pending migrations.
    ///
    /// # Side effects
    /// - Emits `db_open` events with duration and status.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Self::bootstrap("file", || Connection::open(path))
    }

    /// Opens a throwaway in-memory store, mainly for tests and demos.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::bootstrap("memory", Connection::open_in_memory)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Closes the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> DbResult<()> {
        match self.conn.close() {
            Ok(()) => {
                info!("event=db_close module=db status=ok");
                Ok(())
            }
            Err((_conn, err)) => {
                error!(
                    "event=db_close module=db status=error error_code=db_close_failed error={}",
                    err
                );
                Err(DbError::Sqlite(err))
            }
        }
    }

    fn bootstrap(
        mode: &'static str,
        connect: impl FnOnce() -> rusqlite::Result<Connection>,
    ) -> DbResult<Self> {
        let started_at = Instant::now();
        info!("event=db_open module=db status=start mode={mode}");

        let mut conn = connect().map_err(|err| {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            DbError::from(err)
        })?;

        let schema = match configure(&mut conn) {
            Ok(schema) => schema,
            Err(err) => {
                error!(
                    "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };

        info!(
            "event=db_open module=db status=ok mode={mode} schema={schema} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(Self { conn })
    }
}

fn configure(conn: &mut Connection) -> DbResult<u32> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)
}
