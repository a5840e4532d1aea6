// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation summary extraction.

use parley_core::types::StoredMessage;
use parley_markers::{base64, model};

/// Maximum summary length in characters.
pub const SUMMARY_CHARS: usize = 20;

/// Summary of a conversation: the opening of its first message with
/// non-empty text.
pub fn conversation_summary(history: &[StoredMessage]) -> Option<String> {
    history
        .iter()
        .map(|message| visible_text(&message.content))
        .find(|text| !text.trim().is_empty())
        .map(|text| extract_summary(&text))
}

/// First [`SUMMARY_CHARS`] characters of `content`, skipping a leading
/// `[...]` tag and the whitespace after it.
pub fn extract_summary(content: &str) -> String {
    let mut text = content;
    if let Some((_, rest)) = text.strip_prefix('[').and_then(|t| t.split_once(']')) {
        text = rest.trim_start_matches([' ', '\t', '\n']);
    }
    text.chars().take(SUMMARY_CHARS).collect()
}

fn visible_text(content: &str) -> String {
    let text = base64::decode(content).remainder;
    model::decode(&text).content
}
