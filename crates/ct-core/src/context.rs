//! Extractive history-to-context summarizer.
//!
//! Compresses an arbitrarily long case history into a bounded digest made of
//! up to three newline-separated blocks:
//!
//! 1. `Initial user intent: ...` - the first user turn
//! 2. `Latest assistant advice: ...` - the last assistant turn
//! 3. `Recent exchanges:` - the last [`RECENT_WINDOW`] turns, deduplicated
//!
//! The digest is recomputed for every new turn and never persisted.

use crate::message::{Turn, TurnRole};

/// Character budget used when the caller has no preference.
pub const DEFAULT_MAX_CHARS: usize = 1200;

/// Number of trailing turns considered for the recent-exchanges block.
pub const RECENT_WINDOW: usize = 10;

/// Appended after the sliced body when the digest exceeds its budget.
pub const TRUNCATION_MARKER: &str = "\n… (truncated)";

/// Characters reserved out of `max_chars` before the marker is appended.
const TRUNCATION_RESERVE: usize = 100;

/// Collapse every run of whitespace to a single space and trim both ends.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Summarize `history` into a digest of at most `max_chars` characters
/// (plus the truncation marker, when one is needed).
///
/// The history is trusted to be in chronological order. An empty history
/// yields an empty string. Lengths are counted in characters, not bytes.
///
/// The digest always ends with the recent-exchanges block, which carries no
/// trailing newline: it ends with its last line, or with
/// `"Recent exchanges:\n"` when every turn in the window is blank.
pub fn summarize(history: &[Turn], max_chars: usize) -> String {
    if history.is_empty() {
        return String::new();
    }

    let mut blocks = Vec::with_capacity(3);

    if let Some(first) = history.iter().find(|t| t.role == TurnRole::User) {
        blocks.push(format!("Initial user intent: {}", normalize(&first.content)));
    }

    if let Some(last) = history.iter().rev().find(|t| t.role == TurnRole::Assistant) {
        blocks.push(format!("Latest assistant advice: {}", normalize(&last.content)));
    }

    let window = &history[history.len().saturating_sub(RECENT_WINDOW)..];
    let mut recent: Vec<String> = Vec::with_capacity(window.len());
    for turn in window {
        let text = normalize(&turn.content);
        if text.is_empty() {
            continue;
        }
        let line = format!("{}: {}", turn.role, text);
        if !recent.contains(&line) {
            recent.push(line);
        }
    }
    blocks.push(format!("Recent exchanges:\n{}", recent.join("\n")));

    let summary = blocks.join("\n\n");
    let length = summary.chars().count();
    if length <= max_chars {
        return summary;
    }

    tracing::debug!(length, max_chars, "Truncating context summary");

    // Plain character slice: block and word boundaries are not preserved.
    let keep = max_chars.saturating_sub(TRUNCATION_RESERVE);
    let mut truncated: String = summary.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
