//! Typed actions produced by command interpretation.
//!
//! # Responsibility
//! - Define the closed set of structured commands the assistant may emit.
//! - Validate untrusted function-call payloads into that set.
//!
//! # Invariants
//! - A known action name with arguments that do not match its schema never
//!   becomes a `PendingAction`; it is a parse error instead.
//! - A well-formed call with an unknown name becomes `Unsupported`.

use crate::error::ErrorKind;
use crate::model::calendar::DateKey;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const ADD_HABIT: &str = "add_habit";
pub const LOG_HABIT_COMPLETION: &str = "log_habit_completion";
pub const ADD_HABIT_NOTE: &str = "add_habit_note";
pub const SET_MONTHLY_REFLECTION: &str = "set_monthly_reflection";

/// Names of every action kind, in declaration order.
pub const ACTION_KINDS: [&str; 4] = [
    ADD_HABIT,
    LOG_HABIT_COMPLETION,
    ADD_HABIT_NOTE,
    SET_MONTHLY_REFLECTION,
];

/// One interpreted command, consumed immediately by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    AddHabit { name: String },
    LogHabitCompletion { name: String, date: Option<DateKey> },
    AddHabitNote { note: String },
    SetMonthlyReflection { reflection: String },
    /// Structurally valid call naming an action this build does not know.
    Unsupported { kind: String },
}

/// Function-call payload that does not fit the action schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionParseError {
    /// Arguments were not a JSON object.
    ArgumentsNotObject { kind: String },
    MissingField { kind: String, field: &'static str },
    WrongFieldType { kind: String, field: &'static str },
    InvalidDate { kind: String, value: String },
    /// Call name was empty.
    MissingName,
}

impl Display for ActionParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArgumentsNotObject { kind } => {
                write!(f, "arguments for `{kind}` must be an object")
            }
            Self::MissingField { kind, field } => {
                write!(f, "`{kind}` requires field `{field}`")
            }
            Self::WrongFieldType { kind, field } => {
                write!(f, "`{kind}` field `{field}` must be a string")
            }
            Self::InvalidDate { kind, value } => {
                write!(f, "`{kind}` date `{value}` is not YYYY-MM-DD")
            }
            Self::MissingName => write!(f, "function call has no name"),
        }
    }
}

impl Error for ActionParseError {}

impl ActionParseError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::MalformedResponse
    }
}

impl PendingAction {
    /// Validates a function call `(name, args)` from the language service.
    ///
    /// `args` may be `null` only for kinds without required fields; all
    /// current kinds have one, so `null` is rejected as a missing field.
    pub fn from_function_call(name: &str, args: &Value) -> Result<Self, ActionParseError> {
        let kind = name.trim();
        if kind.is_empty() {
            return Err(ActionParseError::MissingName);
        }
        if !ACTION_KINDS.contains(&kind) {
            return Ok(Self::Unsupported {
                kind: kind.to_string(),
            });
        }

        let empty = Map::new();
        let fields = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => {
                return Err(ActionParseError::ArgumentsNotObject {
                    kind: kind.to_string(),
                })
            }
        };

        match kind {
            ADD_HABIT => Ok(Self::AddHabit {
                name: required_string(kind, fields, "name")?,
            }),
            LOG_HABIT_COMPLETION => {
                let name = required_string(kind, fields, "name")?;
                let date = match optional_string(kind, fields, "date")? {
                    Some(raw) => Some(DateKey::parse(raw.trim()).map_err(|_| {
                        ActionParseError::InvalidDate {
                            kind: kind.to_string(),
                            value: raw.clone(),
                        }
                    })?),
                    None => None,
                };
                Ok(Self::LogHabitCompletion { name, date })
            }
            ADD_HABIT_NOTE => Ok(Self::AddHabitNote {
                note: required_string(kind, fields, "note")?,
            }),
            _ => Ok(Self::SetMonthlyReflection {
                reflection: required_string(kind, fields, "reflection")?,
            }),
        }
    }

    /// Wire name of the action kind.
    pub fn kind_name(&self) -> &str {
        match self {
            Self::AddHabit { .. } => ADD_HABIT,
            Self::LogHabitCompletion { .. } => LOG_HABIT_COMPLETION,
            Self::AddHabitNote { .. } => ADD_HABIT_NOTE,
            Self::SetMonthlyReflection { .. } => SET_MONTHLY_REFLECTION,
            Self::Unsupported { kind } => kind.as_str(),
        }
    }

    /// Kind label safe for log lines; unsupported names stay out of logs.
    pub fn log_label(&self) -> &'static str {
        match self {
            Self::AddHabit { .. } => ADD_HABIT,
            Self::LogHabitCompletion { .. } => LOG_HABIT_COMPLETION,
            Self::AddHabitNote { .. } => ADD_HABIT_NOTE,
            Self::SetMonthlyReflection { .. } => SET_MONTHLY_REFLECTION,
            Self::Unsupported { .. } => "unsupported",
        }
    }
}

fn required_string(
    kind: &str,
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<String, ActionParseError> {
    optional_string(kind, fields, field)?.ok_or_else(|| ActionParseError::MissingField {
        kind: kind.to_string(),
        field,
    })
}

fn optional_string(
    kind: &str,
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, ActionParseError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(ActionParseError::WrongFieldType {
            kind: kind.to_string(),
            field,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionParseError, PendingAction};
    use crate::model::calendar::DateKey;
    use serde_json::json;

    #[test]
    fn parses_each_known_kind() {
        assert_eq!(
            PendingAction::from_function_call("add_habit", &json!({"name": "Stretch"})).unwrap(),
            PendingAction::AddHabit {
                name: "Stretch".to_string()
            }
        );
        assert_eq!(
            PendingAction::from_function_call(
                "log_habit_completion",
                &json!({"name": "Read", "date": "2024-09-02"})
            )
            .unwrap(),
            PendingAction::LogHabitCompletion {
                name: "Read".to_string(),
                date: Some(DateKey::parse("2024-09-02").unwrap()),
            }
        );
        assert_eq!(
            PendingAction::from_function_call("add_habit_note", &json!({"note": "x"})).unwrap(),
            PendingAction::AddHabitNote {
                note: "x".to_string()
            }
        );
        assert_eq!(
            PendingAction::from_function_call(
                "set_monthly_reflection",
                &json!({"reflection": "good month"})
            )
            .unwrap(),
            PendingAction::SetMonthlyReflection {
                reflection: "good month".to_string()
            }
        );
    }

    #[test]
    fn date_is_optional_for_logging() {
        let action =
            PendingAction::from_function_call("log_habit_completion", &json!({"name": "Read"}))
                .unwrap();
        assert_eq!(
            action,
            PendingAction::LogHabitCompletion {
                name: "Read".to_string(),
                date: None
            }
        );
    }

    #[test]
    fn rejects_schema_violations() {
        assert!(matches!(
            PendingAction::from_function_call("add_habit", &json!({})),
            Err(ActionParseError::MissingField { field: "name", .. })
        ));
        assert!(matches!(
            PendingAction::from_function_call("add_habit", &json!({"name": 3})),
            Err(ActionParseError::WrongFieldType { field: "name", .. })
        ));
        assert!(matches!(
            PendingAction::from_function_call("add_habit", &json!(["name"])),
            Err(ActionParseError::ArgumentsNotObject { .. })
        ));
        assert!(matches!(
            PendingAction::from_function_call(
                "log_habit_completion",
                &json!({"name": "Read", "date": "yesterday"})
            ),
            Err(ActionParseError::InvalidDate { .. })
        ));
        assert!(matches!(
            PendingAction::from_function_call("  ", &json!({})),
            Err(ActionParseError::MissingName)
        ));
    }

    #[test]
    fn unknown_kind_is_unsupported_not_an_error() {
        let action =
            PendingAction::from_function_call("delete_everything", &json!({"all": true})).unwrap();
        assert_eq!(
            action,
            PendingAction::Unsupported {
                kind: "delete_everything".to_string()
            }
        );
        assert_eq!(action.kind_name(), "delete_everything");
    }
}
