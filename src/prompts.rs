//! Prompts for the intent classifier.
//!
//! Everything the inference service is told lives here so the contract can be
//! read (and tested) in one place. Callers can override the system message via
//! [`crate::config::IntakeConfig::system_prompt`]; the task description is
//! fixed because the response parser depends on it.

use crate::output::Intent;
use serde_json::json;

/// System message: the service must answer with a bare JSON object.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a JSON-only responder.";

/// Marker appended to extracted text that was cut to fit the context limit.
pub const TRUNCATION_MARKER: &str = "...";

/// Question asked when the instruction cannot be mapped to a task.
pub const DEFAULT_CLARIFYING_QUESTION: &str =
    "Do you want a summary, sentiment, or code explanation?";

/// Longest clarifying question (in words) the service is asked to produce.
pub const MAX_QUESTION_WORDS: usize = 14;

/// Build the task description sent as the user message.
///
/// `context` must already be truncated; `instruction` is passed through as-is.
pub fn intent_prompt(context: &str, instruction: &str) -> String {
    let vocabulary = Intent::ALL
        .iter()
        .map(|i| format!("\"{}\"", i.as_str()))
        .collect::<Vec<_>>()
        .join(",");

    let input = json!({
        "extracted_text": context,
        "user_instruction": instruction,
    });
    // A json! object always serialises.
    let input = serde_json::to_string_pretty(&input).unwrap_or_default();

    format!(
        r#"You are an intent classifier and clarifier. Input: extracted_text (may be large) and user_instruction.

Return strictly a JSON object ONLY (no explanation) with keys:
- intent: one of [{vocabulary}]
- confidence: float between 0 and 1
- clarifying_question: string or null (if intent unclear or confidence<0.75)
- required_constraints: optional object (e.g., {{"summary_length":"short"}})

Rules:
- If multiple intents are equally likely OR not enough info, set intent to "unclear" and include a short clarifying_question (<= {MAX_QUESTION_WORDS} words).
- If the user explicitly asked a task, set intent accordingly.

Input JSON:
{input}"#
    )
}
