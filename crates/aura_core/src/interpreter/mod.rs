//! Command interpreter: natural-language utterance to text or typed action.
//!
//! # Responsibility
//! - Hand the utterance, a state snapshot and today's date to the language
//!   service.
//! - Validate whatever comes back into exactly one `CommandResult`.
//!
//! # Invariants
//! - `interpret` never fails and never panics: every upstream failure is
//!   converted into a `Text` result with a user-safe message.
//! - A result is either text or an action, never both and never neither.
//! - Utterances and state are not logged.

pub mod gemini;
pub mod prompt;

use crate::error::ErrorKind;
use crate::model::action::PendingAction;
use crate::model::calendar::DateKey;
use crate::model::habit::Habit;
use crate::model::record::MonthlyRecord;
use log::{info, warn};
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use gemini::GeminiClient;

const EMPTY_UTTERANCE_MESSAGE: &str =
    "Tell me what to do, e.g. \"add a new habit to meditate daily\".";
const MISSING_CREDENTIAL_MESSAGE: &str = "API Key not configured. Please set your API key.";
const UNAVAILABLE_MESSAGE: &str =
    "Sorry, I encountered an error. It might be related to your API key. Please try again.";
const MALFORMED_MESSAGE: &str =
    "Sorry, I couldn't make sense of the assistant's reply. Please try rephrasing.";

/// Outcome of interpreting one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Free text for the user; no state change.
    Text(String),
    /// Structured action to resolve against the store.
    Action(PendingAction),
}

/// Read-only state handed to the language service for disambiguation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub month_key: String,
    pub habits: Vec<Habit>,
    pub note: String,
    pub reflection: String,
}

impl From<&MonthlyRecord> for StateSnapshot {
    fn from(record: &MonthlyRecord) -> Self {
        Self {
            month_key: record.month_key.to_string(),
            habits: record.habits.clone(),
            note: record.note.clone(),
            reflection: record.reflection.clone(),
        }
    }
}

/// Input for one language service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub utterance: String,
    pub state: StateSnapshot,
    pub today: DateKey,
}

/// Raw reply from the language service, before schema validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceReply {
    Text(String),
    FunctionCall { name: String, args: Value },
}

/// Language service failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// No API key configured; no request was sent.
    MissingCredential,
    Unavailable(String),
    Malformed(String),
}

impl Display for UpstreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCredential => write!(f, "language service credential missing"),
            Self::Unavailable(reason) => write!(f, "language service unavailable: {reason}"),
            Self::Malformed(reason) => write!(f, "language service reply malformed: {reason}"),
        }
    }
}

impl Error for UpstreamError {}

impl UpstreamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCredential | Self::Unavailable(_) => ErrorKind::UpstreamUnavailable,
            Self::Malformed(_) => ErrorKind::MalformedResponse,
        }
    }

    fn user_message(&self) -> &'static str {
        match self {
            Self::MissingCredential => MISSING_CREDENTIAL_MESSAGE,
            Self::Unavailable(_) => UNAVAILABLE_MESSAGE,
            Self::Malformed(_) => MALFORMED_MESSAGE,
        }
    }
}

/// Hosted language-understanding service.
pub trait LanguageService {
    fn generate(&self, request: &CommandRequest) -> Result<ServiceReply, UpstreamError>;
}

impl<T: LanguageService + ?Sized> LanguageService for &T {
    fn generate(&self, request: &CommandRequest) -> Result<ServiceReply, UpstreamError> {
        (**self).generate(request)
    }
}

impl<T: LanguageService + ?Sized> LanguageService for Box<T> {
    fn generate(&self, request: &CommandRequest) -> Result<ServiceReply, UpstreamError> {
        (**self).generate(request)
    }
}

/// Fail-closed wrapper around a language service.
pub struct CommandInterpreter<S: LanguageService> {
    service: S,
}

impl<S: LanguageService> CommandInterpreter<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Interprets `utterance` against `state` with `today` as the default date.
    pub fn interpret(&self, utterance: &str, state: &MonthlyRecord, today: DateKey) -> CommandResult {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return CommandResult::Text(EMPTY_UTTERANCE_MESSAGE.to_string());
        }

        let request = CommandRequest {
            utterance: utterance.to_string(),
            state: StateSnapshot::from(state),
            today,
        };

        match self.service.generate(&request) {
            Ok(ServiceReply::Text(text)) => {
                if text.trim().is_empty() {
                    warn!("event=command_interpret module=interpreter status=error error_kind=malformed_response reason=empty_text");
                    return CommandResult::Text(MALFORMED_MESSAGE.to_string());
                }
                info!("event=command_interpret module=interpreter status=ok result=text");
                CommandResult::Text(text)
            }
            Ok(ServiceReply::FunctionCall { name, args }) => {
                match PendingAction::from_function_call(&name, &args) {
                    Ok(action) => {
                        info!(
                            "event=command_interpret module=interpreter status=ok result=action kind={}",
                            action.log_label()
                        );
                        CommandResult::Action(action)
                    }
                    Err(err) => {
                        warn!(
                            "event=command_interpret module=interpreter status=error error_kind={} error={}",
                            err.kind(),
                            err
                        );
                        CommandResult::Text(MALFORMED_MESSAGE.to_string())
                    }
                }
            }
            Err(err) => {
                warn!(
                    "event=command_interpret module=interpreter status=error error_kind={} error={}",
                    err.kind(),
                    err
                );
                CommandResult::Text(err.user_message().to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CommandInterpreter, CommandRequest, CommandResult, LanguageService, ServiceReply,
        UpstreamError, MISSING_CREDENTIAL_MESSAGE,
    };
    use crate::model::action::PendingAction;
    use crate::model::calendar::{DateKey, MonthKey};
    use crate::model::habit::Habit;
    use crate::model::record::MonthlyRecord;
    use serde_json::json;
    use std::cell::RefCell;

    struct Scripted {
        reply: Result<ServiceReply, UpstreamError>,
        seen: RefCell<Vec<CommandRequest>>,
    }

    impl Scripted {
        fn new(reply: Result<ServiceReply, UpstreamError>) -> Self {
            Self {
                reply,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl LanguageService for Scripted {
        fn generate(&self, request: &CommandRequest) -> Result<ServiceReply, UpstreamError> {
            self.seen.borrow_mut().push(request.clone());
            self.reply.clone()
        }
    }

    fn state() -> MonthlyRecord {
        let mut record = MonthlyRecord::empty(MonthKey::parse("2024-09").unwrap());
        record.habits.push(Habit::new(1, "Read"));
        record
    }

    fn today() -> DateKey {
        DateKey::parse("2024-09-14").unwrap()
    }

    #[test]
    fn function_call_becomes_action_and_request_carries_state() {
        let service = Scripted::new(Ok(ServiceReply::FunctionCall {
            name: "log_habit_completion".to_string(),
            args: json!({"name": "read"}),
        }));
        let interpreter = CommandInterpreter::new(&service);

        let result = interpreter.interpret("  log read  ", &state(), today());
        assert_eq!(
            result,
            CommandResult::Action(PendingAction::LogHabitCompletion {
                name: "read".to_string(),
                date: None
            })
        );

        let seen = service.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].utterance, "log read");
        assert_eq!(seen[0].today, today());
        assert_eq!(seen[0].state.habits[0].name, "Read");
    }

    #[test]
    fn blank_utterance_skips_the_service() {
        let service = Scripted::new(Ok(ServiceReply::Text("unused".to_string())));
        let interpreter = CommandInterpreter::new(&service);
        assert!(matches!(
            interpreter.interpret("   ", &state(), today()),
            CommandResult::Text(_)
        ));
        assert!(service.seen.borrow().is_empty());
    }

    #[test]
    fn upstream_failures_fail_closed_to_text() {
        let cases = [
            UpstreamError::MissingCredential,
            UpstreamError::Unavailable("connection refused".to_string()),
            UpstreamError::Malformed("no candidates".to_string()),
        ];
        for err in cases {
            let service = Scripted::new(Err(err));
            let interpreter = CommandInterpreter::new(service);
            assert!(matches!(
                interpreter.interpret("add habit", &state(), today()),
                CommandResult::Text(_)
            ));
        }

        let interpreter =
            CommandInterpreter::new(Scripted::new(Err(UpstreamError::MissingCredential)));
        assert_eq!(
            interpreter.interpret("hi", &state(), today()),
            CommandResult::Text(MISSING_CREDENTIAL_MESSAGE.to_string())
        );
    }

    #[test]
    fn malformed_arguments_fall_back_to_text() {
        let replies = [
            ServiceReply::FunctionCall {
                name: "add_habit".to_string(),
                args: json!({"title": "Stretch"}),
            },
            ServiceReply::FunctionCall {
                name: "log_habit_completion".to_string(),
                args: json!({"name": "Read", "date": "09/14/2024"}),
            },
            ServiceReply::FunctionCall {
                name: String::new(),
                args: json!({}),
            },
            ServiceReply::Text("   ".to_string()),
        ];
        for reply in replies {
            let interpreter = CommandInterpreter::new(Scripted::new(Ok(reply)));
            assert!(matches!(
                interpreter.interpret("do it", &state(), today()),
                CommandResult::Text(_)
            ));
        }
    }

    #[test]
    fn plain_text_reply_is_passed_through() {
        let interpreter = CommandInterpreter::new(Scripted::new(Ok(ServiceReply::Text(
            "You have one habit.".to_string(),
        ))));
        assert_eq!(
            interpreter.interpret("what do I track?", &state(), today()),
            CommandResult::Text("You have one habit.".to_string())
        );
    }
}
