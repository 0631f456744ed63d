//! Prompt text and function declarations sent to the language service.

use super::CommandRequest;
use crate::model::action::{ADD_HABIT, ADD_HABIT_NOTE, LOG_HABIT_COMPLETION, SET_MONTHLY_REFLECTION};
use serde_json::{json, Value};

/// Renders the context prompt for one request.
pub fn render_prompt(request: &CommandRequest) -> String {
    let state = serde_json::to_string(&request.state).unwrap_or_else(|_| "{}".to_string());
    format!(
        "You are Aura, a helpful assistant for a habit tracking app.\n\
         Analyze the user's command and call the matching function when it asks for a change.\n\
         Today's date is {today}. Use it when the user says \"today\" or gives no date.\n\
         Habit names in function calls must match the names in the current state.\n\
         If the command is a question or no function fits, answer briefly in plain text.\n\
         \n\
         Current state for {month}:\n{state}\n\
         \n\
         User command: \"{utterance}\"",
        today = request.today,
        month = request.state.month_key,
        state = state,
        utterance = request.utterance,
    )
}

/// Declarations for the four supported action kinds.
pub fn function_declarations() -> Value {
    json!([
        {
            "name": ADD_HABIT,
            "description": "Adds a new habit to track for the current month.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "name": {"type": "STRING", "description": "The name of the new habit."}
                },
                "required": ["name"]
            }
        },
        {
            "name": LOG_HABIT_COMPLETION,
            "description": "Marks an existing habit as completed on a date.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "name": {"type": "STRING", "description": "The name of the habit to log."},
                    "date": {"type": "STRING", "description": "Date in YYYY-MM-DD format. Defaults to today."}
                },
                "required": ["name"]
            }
        },
        {
            "name": ADD_HABIT_NOTE,
            "description": "Appends a line to the month's habit notes.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "note": {"type": "STRING", "description": "The note text."}
                },
                "required": ["note"]
            }
        },
        {
            "name": SET_MONTHLY_REFLECTION,
            "description": "Replaces the monthly reflection text.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "reflection": {"type": "STRING", "description": "The reflection text."}
                },
                "required": ["reflection"]
            }
        }
    ])
}
