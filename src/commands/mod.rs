//! Command handlers for the CLI
//!
//! - `generate` runs a streaming session and saves the result
//! - `history` lists, shows, searches, deletes and renames conversations
//! - `migrate` copies local conversations to the hosted backend

pub mod generate;
pub mod history;
pub mod migrate;

/// Shorten `text` to at most `max` characters, marking the cut with `...`
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
