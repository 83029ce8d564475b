//! Conversational-vs-actionable request classification.

use crate::planner::intent::{contains_any, normalize};

/// Any of these makes a request actionable, even when phrased as a question.
const ACTION_VERBS: &[&str] = &[
    "create", "make", "build", "add", "generate", "fix", "implement", "write", "attach", "remove",
    "delete", "update", "change", "modify", "set", "move", "rename", "refactor", "integrate",
    "import", "design", "draw", "animate", "spawn", "place", "connect", "validate", "run",
    "setup", "install", "edit", "replace", "insert", "convert",
];

const INFO_WORDS: &[&str] = &[
    "status", "progress", "summary", "overview", "explain", "describe", "help", "info",
    "details", "stats",
];

const QUESTION_PHRASES: &[&str] = &[
    "what", "why", "how", "when", "where", "which", "who", "can you", "could you", "would you",
    "is there", "are there", "do i", "does", "tell me", "show me",
];

/// Whether `text` asks for information rather than changes.
///
/// Rules, first match wins:
/// 1. an action verb makes it actionable, whatever else it contains;
/// 2. an info or status word makes it conversational;
/// 3. a `?` or question phrase makes it conversational;
/// 4. otherwise it is actionable.
pub fn is_conversational_query(text: &str) -> bool {
    let normalized = normalize(text);

    if contains_any(&normalized, ACTION_VERBS) {
        return false;
    }
    if contains_any(&normalized, INFO_WORDS) {
        return true;
    }
    normalized.contains('?') || contains_any(&normalized, QUESTION_PHRASES)
}
