//! Core domain logic for the Aura habit tracker.
//! This crate is the single source of truth for habit invariants.

pub mod config;
pub mod controller;
pub mod db;
pub mod error;
pub mod identity;
pub mod interpreter;
pub mod logging;
pub mod model;
pub mod repo;
pub mod resolver;
pub mod service;
pub mod store;

pub use config::{ConfigError, CoreConfig, LanguageServiceConfig};
pub use controller::{ApplyError, MutationController, MutationTicket, SettleOutcome};
pub use db::{Database, DbError, DbResult};
pub use error::ErrorKind;
pub use identity::{Identity, IdentityProvider, SessionIdentity};
pub use interpreter::{
    CommandInterpreter, CommandRequest, CommandResult, GeminiClient, LanguageService,
    ServiceReply, StateSnapshot, UpstreamError,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::action::{ActionParseError, PendingAction};
pub use model::calendar::{CalendarError, DateKey, MonthKey};
pub use model::habit::{Habit, HabitId, HabitIdSource, HabitPatch, HabitValidationError};
pub use model::record::MonthlyRecord;
pub use repo::habit_repo::{
    persist_mutation, HabitRepository, RepoError, RepoResult, SqliteHabitRepository,
};
pub use resolver::{resolve, Resolution, ResolveContext, DEFAULT_HABIT_CAP};
pub use service::tracker_service::{CommandOutcome, HabitTracker, TrackerError, STARTER_HABITS};
pub use store::{MutationError, StoreMutation};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
