use aura_core::{
    CommandRequest, Database, DateKey, ErrorKind, Habit, HabitId, HabitPatch, HabitRepository,
    HabitTracker, Identity, LanguageService, MonthKey, MonthlyRecord, RepoError, RepoResult,
    ServiceReply, SessionIdentity, SqliteHabitRepository, UpstreamError,
};
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// Replays canned replies in order; an exhausted script is a transport error.
#[derive(Default)]
struct ScriptedService {
    replies: RefCell<VecDeque<Result<ServiceReply, UpstreamError>>>,
}

impl ScriptedService {
    fn push_call(&self, name: &str, args: serde_json::Value) {
        self.replies.borrow_mut().push_back(Ok(ServiceReply::FunctionCall {
            name: name.to_string(),
            args,
        }));
    }

    fn push(&self, reply: Result<ServiceReply, UpstreamError>) {
        self.replies.borrow_mut().push_back(reply);
    }
}

impl LanguageService for ScriptedService {
    fn generate(&self, _request: &CommandRequest) -> Result<ServiceReply, UpstreamError> {
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(UpstreamError::Unavailable("script exhausted".to_string())))
    }
}

/// Delegates to an inner repository; `update_habit` fails while armed.
struct FlakyRepo<'a, R> {
    inner: R,
    fail_updates: &'a Cell<bool>,
}

impl<R: HabitRepository> HabitRepository for FlakyRepo<'_, R> {
    fn get_month(&self, month: MonthKey) -> RepoResult<MonthlyRecord> {
        self.inner.get_month(month)
    }
    fn add_habit(&self, month: MonthKey, habit: &Habit) -> RepoResult<Habit> {
        self.inner.add_habit(month, habit)
    }
    fn update_habit(&self, id: HabitId, patch: &HabitPatch) -> RepoResult<Habit> {
        if self.fail_updates.get() {
            return Err(RepoError::Encode("completions not serializable".to_string()));
        }
        self.inner.update_habit(id, patch)
    }
    fn delete_habit(&self, id: HabitId) -> RepoResult<()> {
        self.inner.delete_habit(id)
    }
    fn save_note(&self, month: MonthKey, text: &str) -> RepoResult<()> {
        self.inner.save_note(month, text)
    }
    fn save_reflection(&self, month: MonthKey, text: &str) -> RepoResult<()> {
        self.inner.save_reflection(month, text)
    }
}

fn september() -> MonthKey {
    MonthKey::parse("2024-09").unwrap()
}

fn today() -> DateKey {
    DateKey::parse("2024-09-14").unwrap()
}

#[test]
fn commands_flow_through_to_the_database() {
    let db = Database::open_in_memory().unwrap();
    let identity = Identity::new("u-1").unwrap();
    let service = ScriptedService::default();
    let mut tracker = HabitTracker::new(
        SqliteHabitRepository::new(db.conn(), &identity),
        &service,
        september(),
        3,
    );
    tracker.open_month(september()).unwrap();

    service.push_call("add_habit", json!({"name": "Read"}));
    let outcome = tracker.run_command("add a habit to read", today());
    assert!(outcome.applied);
    assert_eq!(outcome.message, "New habit added: \"Read\"");

    service.push_call("log_habit_completion", json!({"name": "read"}));
    let outcome = tracker.run_command("I read today", today());
    assert!(outcome.applied);
    assert_eq!(outcome.message, "Logged \"Read\" for 2024-09-14");

    service.push_call("add_habit_note", json!({"note": "Buy milk"}));
    service.push_call("add_habit_note", json!({"note": "Call mom"}));
    tracker.run_command("note buy milk", today());
    tracker.run_command("note call mom", today());

    service.push_call("set_monthly_reflection", json!({"reflection": "Steady month"}));
    tracker.run_command("reflect", today());

    let stored = SqliteHabitRepository::new(db.conn(), &identity)
        .get_month(september())
        .unwrap();
    assert_eq!(&stored, tracker.record());
    assert_eq!(stored.note, "- Buy milk\n- Call mom");
    assert_eq!(stored.reflection, "Steady month");
    assert!(stored.habits[0].is_completed(today()));
}

#[test]
fn logging_the_same_day_twice_is_idempotent() {
    let db = Database::open_in_memory().unwrap();
    let identity = Identity::new("u-1").unwrap();
    let service = ScriptedService::default();
    let mut tracker = HabitTracker::new(
        SqliteHabitRepository::new(db.conn(), &identity),
        &service,
        september(),
        3,
    );
    service.push_call("add_habit", json!({"name": "Walk"}));
    tracker.run_command("add walk", today());

    service.push_call("log_habit_completion", json!({"name": "Walk", "date": "2024-09-10"}));
    tracker.run_command("walked on the 10th", today());
    let once = tracker.record().clone();

    service.push_call("log_habit_completion", json!({"name": "walk", "date": "2024-09-10"}));
    let outcome = tracker.run_command("walked on the 10th", today());
    assert!(outcome.applied);
    assert_eq!(tracker.record(), &once);
}

#[test]
fn adding_past_the_cap_never_mutates() {
    let db = Database::open_in_memory().unwrap();
    let identity = Identity::new("u-1").unwrap();
    let service = ScriptedService::default();
    let mut tracker = HabitTracker::new(
        SqliteHabitRepository::new(db.conn(), &identity),
        &service,
        september(),
        3,
    );
    assert_eq!(tracker.seed_starter_habits().unwrap(), 3);
    let before = tracker.record().clone();

    service.push_call("add_habit", json!({"name": "Meditate"}));
    let outcome = tracker.run_command("add meditate", today());
    assert!(!outcome.applied);
    assert_eq!(outcome.error_kind, Some(ErrorKind::ValidationFailed));
    assert_eq!(outcome.message, "You can only track 3 habits at a time.");
    assert_eq!(tracker.record(), &before);
}

#[test]
fn unknown_habit_reports_not_found() {
    let db = Database::open_in_memory().unwrap();
    let identity = Identity::new("u-1").unwrap();
    let service = ScriptedService::default();
    let mut tracker = HabitTracker::new(
        SqliteHabitRepository::new(db.conn(), &identity),
        &service,
        september(),
        3,
    );
    service.push_call("log_habit_completion", json!({"name": "Meditate"}));
    let outcome = tracker.run_command("log meditate", today());
    assert_eq!(outcome.error_kind, Some(ErrorKind::NotFound));
    assert_eq!(outcome.message, "Couldn't find the habit \"Meditate\"");
    assert!(tracker.record().habits.is_empty());
}

#[test]
fn rejected_update_restores_the_exact_snapshot() {
    let db = Database::open_in_memory().unwrap();
    let identity = Identity::new("u-1").unwrap();
    let fail_updates = Cell::new(false);
    let repo = FlakyRepo {
        inner: SqliteHabitRepository::new(db.conn(), &identity),
        fail_updates: &fail_updates,
    };
    let service = ScriptedService::default();
    let mut tracker = HabitTracker::new(repo, &service, september(), 3);
    tracker.seed_starter_habits().unwrap();
    let first = tracker.record().habits[0].id;
    tracker
        .toggle_completion(first, DateKey::parse("2024-09-01").unwrap())
        .unwrap();
    let before = tracker.record().clone();

    fail_updates.set(true);
    let err = tracker
        .toggle_completion(first, DateKey::parse("2024-09-02").unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    assert_eq!(tracker.record(), &before);

    service.push_call("log_habit_completion", json!({"name": "morning walk"}));
    let outcome = tracker.run_command("I walked", today());
    assert!(!outcome.applied);
    assert_eq!(outcome.error_kind, Some(ErrorKind::UpstreamUnavailable));
    assert!(outcome.message.starts_with("Logged \"Morning walk\""));
    assert_eq!(tracker.record(), &before);

    fail_updates.set(false);
    service.push_call("log_habit_completion", json!({"name": "morning walk"}));
    let outcome = tracker.run_command("I walked", today());
    assert!(outcome.applied);
    assert_ne!(tracker.record(), &before);
}

#[test]
fn malformed_upstream_replies_always_yield_one_message() {
    let db = Database::open_in_memory().unwrap();
    let identity = Identity::new("u-1").unwrap();
    let service = ScriptedService::default();
    let mut tracker = HabitTracker::new(
        SqliteHabitRepository::new(db.conn(), &identity),
        &service,
        september(),
        3,
    );

    service.push_call("add_habit", json!("Read"));
    service.push_call("add_habit", json!({"name": 7}));
    service.push_call("log_habit_completion", json!({"name": "Read", "date": "2024-9-1"}));
    service.push_call("delete_everything", json!({}));
    service.push(Ok(ServiceReply::Text(String::new())));
    service.push(Err(UpstreamError::Malformed("truncated".to_string())));
    service.push(Err(UpstreamError::MissingCredential));

    for _ in 0..7 {
        let outcome = tracker.run_command("do something", today());
        assert!(!outcome.message.is_empty());
        assert!(!outcome.applied);
    }
    assert!(tracker.record().habits.is_empty());
}

#[test]
fn signed_out_session_rolls_back_and_reports_authentication() {
    let db = Database::open_in_memory().unwrap();
    let session = SessionIdentity::new();
    let service = ScriptedService::default();
    let mut tracker = HabitTracker::new(
        SqliteHabitRepository::new(db.conn(), &session),
        &service,
        september(),
        3,
    );

    let err = tracker.open_month(september()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationRequired);

    service.push_call("add_habit", json!({"name": "Read"}));
    let outcome = tracker.run_command("add read", today());
    assert_eq!(outcome.error_kind, Some(ErrorKind::AuthenticationRequired));
    assert!(tracker.record().habits.is_empty());

    session.sign_in(Identity::new("u-1").unwrap());
    tracker.open_month(september()).unwrap();
    assert!(tracker.add_blank_habit().is_ok());
}

#[test]
fn reopening_a_month_keeps_new_ids_unique() {
    let db = Database::open_in_memory().unwrap();
    let identity = Identity::new("u-1").unwrap();
    let far_future_id: HabitId = i64::MAX / 2;
    SqliteHabitRepository::new(db.conn(), &identity)
        .add_habit(september(), &Habit::new(far_future_id, "Imported"))
        .unwrap();

    let service = ScriptedService::default();
    let mut tracker = HabitTracker::new(
        SqliteHabitRepository::new(db.conn(), &identity),
        &service,
        september(),
        3,
    );
    tracker.open_month(september()).unwrap();
    let id = tracker.add_blank_habit().unwrap();
    assert!(id > far_future_id);

    let october = MonthKey::parse("2024-10").unwrap();
    assert!(tracker.open_month(october).unwrap().habits.is_empty());
    assert_eq!(tracker.month(), october);
}

#[test]
fn yesterday_on_the_first_lands_in_the_previous_month() {
    let db = Database::open_in_memory().unwrap();
    let identity = Identity::new("u-1").unwrap();
    let repo = SqliteHabitRepository::new(db.conn(), &identity);
    repo.add_habit(september(), &Habit::new(1, "Meditation")).unwrap();
    let october = MonthKey::parse("2024-10").unwrap();
    repo.add_habit(october, &Habit::new(2, "Meditation")).unwrap();

    let service = ScriptedService::default();
    let mut tracker = HabitTracker::new(
        SqliteHabitRepository::new(db.conn(), &identity),
        &service,
        october,
        3,
    );
    tracker.open_month(october).unwrap();
    let resident = tracker.record().clone();
    let first = DateKey::parse("2024-10-01").unwrap();
    let yesterday = DateKey::parse("2024-09-30").unwrap();

    service.push_call(
        "log_habit_completion",
        json!({"name": "meditation", "date": "2024-09-30"}),
    );
    let outcome = tracker.run_command("log meditation for yesterday", first);
    assert!(outcome.applied);
    assert_eq!(outcome.error_kind, None);
    assert_eq!(outcome.message, "Logged \"Meditation\" for 2024-09-30");

    assert_eq!(tracker.month(), october);
    assert_eq!(tracker.record(), &resident);
    let stored = repo.get_month(september()).unwrap();
    assert!(stored.habits[0].is_completed(yesterday));
    assert!(repo.get_month(october).unwrap().habits[0].completions.is_empty());
}

#[test]
fn logging_into_a_month_without_that_habit_is_not_found() {
    let db = Database::open_in_memory().unwrap();
    let identity = Identity::new("u-1").unwrap();
    let october = MonthKey::parse("2024-10").unwrap();
    let service = ScriptedService::default();
    let mut tracker = HabitTracker::new(
        SqliteHabitRepository::new(db.conn(), &identity),
        &service,
        october,
        3,
    );
    tracker.open_month(october).unwrap();
    tracker.seed_starter_habits().unwrap();
    let resident = tracker.record().clone();

    service.push_call(
        "log_habit_completion",
        json!({"name": "Morning walk", "date": "2024-09-30"}),
    );
    let outcome = tracker.run_command("I walked yesterday", DateKey::parse("2024-10-01").unwrap());
    assert!(!outcome.applied);
    assert_eq!(outcome.error_kind, Some(ErrorKind::NotFound));
    assert_eq!(tracker.month(), october);
    assert_eq!(tracker.record(), &resident);
    assert!(SqliteHabitRepository::new(db.conn(), &identity)
        .get_month(september())
        .unwrap()
        .habits
        .is_empty());
}
