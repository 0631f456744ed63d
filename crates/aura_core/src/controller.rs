//! Optimistic mutation controller.
//!
//! # Responsibility
//! - Be the only writer of the resident monthly record.
//! - Apply mutations locally first, then settle them against persistence.
//! - Roll back exactly the failed mutation when persistence rejects it.
//!
//! # Invariants
//! - Local application order equals issue order.
//! - Observed state is always a whole number of applied mutations; a
//!   mutation is never visible half-applied.
//! - A failed mutation restores its own snapshot and replays every later,
//!   not-yet-compacted mutation on top, so newer edits survive a rollback.
//! - Tickets from before the last `load` are stale and settle as no-ops.
//!
//! # See also
//! - store.rs

use crate::error::ErrorKind;
use crate::model::record::MonthlyRecord;
use crate::store::{MutationError, StoreMutation};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Handle for one locally applied mutation awaiting persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationTicket {
    generation: u64,
    seq: u64,
}

/// Result of settling a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    Confirmed,
    RolledBack {
        /// Later mutations re-applied on top of the restored snapshot.
        replayed: usize,
        /// Later mutations that no longer applied and were discarded.
        dropped: Vec<MutationTicket>,
    },
    /// Ticket unknown, already settled, or issued before the last load.
    Stale,
}

/// Failure of a full optimistic apply.
#[derive(Debug)]
pub enum ApplyError<E> {
    /// Mutation did not apply locally; nothing was persisted.
    Rejected(MutationError),
    /// Persistence failed; local state was rolled back.
    Persistence(E),
}

impl<E: Display> Display for ApplyError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "change was not saved: {err}"),
        }
    }
}

impl<E: Error + 'static> Error for ApplyError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Rejected(err) => Some(err),
            Self::Persistence(err) => Some(err),
        }
    }
}

impl<E> ApplyError<E> {
    /// Category of a local rejection; persistence failures map to
    /// `UpstreamUnavailable` unless the caller knows better.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Rejected(err) => err.kind(),
            Self::Persistence(_) => ErrorKind::UpstreamUnavailable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryStatus {
    Pending,
    Confirmed,
}

#[derive(Debug, Clone)]
struct LogEntry {
    seq: u64,
    mutation: StoreMutation,
    /// Record value right before this mutation was applied.
    snapshot: MonthlyRecord,
    status: EntryStatus,
}

/// Single writer for the resident monthly record.
#[derive(Debug)]
pub struct MutationController {
    record: MonthlyRecord,
    generation: u64,
    next_seq: u64,
    /// Unsettled mutations plus confirmed ones still behind a pending one.
    log: Vec<LogEntry>,
}

impl MutationController {
    pub fn new(record: MonthlyRecord) -> Self {
        Self {
            record,
            generation: 0,
            next_seq: 0,
            log: Vec::new(),
        }
    }

    /// Current local state.
    pub fn record(&self) -> &MonthlyRecord {
        &self.record
    }

    /// Number of mutations still awaiting persistence.
    pub fn pending_count(&self) -> usize {
        self.log
            .iter()
            .filter(|entry| entry.status == EntryStatus::Pending)
            .count()
    }

    /// Installs a freshly loaded record. In-flight tickets become stale.
    pub fn load(&mut self, record: MonthlyRecord) {
        if !self.log.is_empty() {
            warn!(
                "event=mutation_load module=controller status=discard_in_flight month={} in_flight={}",
                record.month_key,
                self.log.len()
            );
        }
        self.generation += 1;
        self.log.clear();
        self.record = record;
    }

    /// Applies `mutation` locally and returns a ticket to settle later.
    pub fn begin(&mut self, mutation: StoreMutation) -> Result<MutationTicket, MutationError> {
        let snapshot = self.record.clone();
        let mut next = snapshot.clone();
        if let Err(err) = mutation.apply(&mut next) {
            debug!(
                "event=mutation_apply module=controller status=rejected kind={} error_kind={}",
                mutation.label(),
                err.kind()
            );
            return Err(err);
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.record = next;
        debug!(
            "event=mutation_apply module=controller status=ok kind={} seq={}",
            mutation.label(),
            seq
        );
        self.log.push(LogEntry {
            seq,
            mutation,
            snapshot,
            status: EntryStatus::Pending,
        });

        Ok(MutationTicket {
            generation: self.generation,
            seq,
        })
    }

    /// Marks a mutation as persisted.
    pub fn confirm(&mut self, ticket: MutationTicket) -> SettleOutcome {
        let Some(index) = self.position(ticket) else {
            return SettleOutcome::Stale;
        };
        self.log[index].status = EntryStatus::Confirmed;
        self.compact();
        SettleOutcome::Confirmed
    }

    /// Rolls back a mutation whose persistence failed.
    pub fn fail(&mut self, ticket: MutationTicket, reason: &dyn Display) -> SettleOutcome {
        let Some(index) = self.position(ticket) else {
            warn!(
                "event=mutation_rollback module=controller status=stale seq={}",
                ticket.seq
            );
            return SettleOutcome::Stale;
        };

        let generation = self.generation;
        let failed = self.log.remove(index);
        let mut restored = failed.snapshot;
        let mut replayed = 0;
        let mut dropped = Vec::new();
        let mut kept = Vec::with_capacity(self.log.len());

        for (position, mut entry) in self.log.drain(..).enumerate() {
            if position < index {
                kept.push(entry);
                continue;
            }
            let before = restored.clone();
            match entry.mutation.apply(&mut restored) {
                Ok(()) => {
                    entry.snapshot = before;
                    replayed += 1;
                    kept.push(entry);
                }
                Err(err) => {
                    warn!(
                        "event=mutation_replay module=controller status=dropped kind={} habit={} seq={} confirmed={} error={}",
                        entry.mutation.label(),
                        habit_field(&entry.mutation),
                        entry.seq,
                        entry.status == EntryStatus::Confirmed,
                        err
                    );
                    dropped.push(MutationTicket {
                        generation,
                        seq: entry.seq,
                    });
                }
            }
        }

        self.log = kept;
        self.record = restored;
        self.compact();

        warn!(
            "event=mutation_rollback module=controller status=ok kind={} habit={} seq={} replayed={} dropped={} error={}",
            failed.mutation.label(),
            habit_field(&failed.mutation),
            failed.seq,
            replayed,
            dropped.len(),
            reason
        );
        SettleOutcome::RolledBack { replayed, dropped }
    }

    /// Applies `mutation` optimistically and persists it with `persist_op`.
    ///
    /// `persist_op` receives the mutation and the post-mutation record. On
    /// failure the mutation is rolled back and the error returned; no retry
    /// is attempted.
    pub fn apply<E, F>(&mut self, mutation: StoreMutation, persist_op: F) -> Result<(), ApplyError<E>>
    where
        E: Display,
        F: FnOnce(&StoreMutation, &MonthlyRecord) -> Result<(), E>,
    {
        let label = mutation.label();
        let persisted = mutation.clone();
        let ticket = self.begin(mutation).map_err(ApplyError::Rejected)?;

        match persist_op(&persisted, &self.record) {
            Ok(()) => {
                self.confirm(ticket);
                info!(
                    "event=mutation_persist module=controller status=ok kind={} seq={}",
                    label, ticket.seq
                );
                Ok(())
            }
            Err(err) => {
                self.fail(ticket, &err);
                Err(ApplyError::Persistence(err))
            }
        }
    }

    fn position(&self, ticket: MutationTicket) -> Option<usize> {
        if ticket.generation != self.generation {
            return None;
        }
        self.log
            .iter()
            .position(|entry| entry.seq == ticket.seq && entry.status == EntryStatus::Pending)
    }

    /// Drops confirmed entries no pending mutation sits in front of.
    fn compact(&mut self) {
        let settled = self
            .log
            .iter()
            .take_while(|entry| entry.status == EntryStatus::Confirmed)
            .count();
        self.log.drain(..settled);
    }
}

/// Log value for the habit a mutation targets; `-` for month-level edits.
fn habit_field(mutation: &StoreMutation) -> String {
    mutation
        .touched_habit()
        .map_or_else(|| "-".to_string(), |id| id.to_string())
}
