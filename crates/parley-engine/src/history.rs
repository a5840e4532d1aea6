// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion of stored history into upstream request messages.

use chrono::{DateTime, TimeZone};
use parley_core::types::{ChatMessage, Role, StoredMessage};
use parley_markers::{base64, model, think};

/// Strips stored markers so history can be replayed to a provider.
///
/// Assistant turns lose their model tag and have the think marker moved
/// into `reasoning_content`; user turns lose their image attachment.
pub fn sanitize(history: &[StoredMessage]) -> Vec<ChatMessage> {
    history.iter().map(sanitize_message).collect()
}

fn sanitize_message(message: &StoredMessage) -> ChatMessage {
    match message.role {
        Role::Assistant => {
            let tagged = model::decode(&message.content);
            let reasoning = think::decode(&message.reasoning_content).payload;
            ChatMessage {
                role: Role::Assistant,
                content: tagged.content,
                reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
                image_url: None,
            }
        }
        Role::User => ChatMessage::text(Role::User, base64::decode(&message.content).remainder),
        Role::System => ChatMessage::text(Role::System, message.content.clone()),
    }
}

/// System message stating the current local date and time.
pub fn system_prompt<Tz>(now: DateTime<Tz>) -> ChatMessage
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    ChatMessage::text(
        Role::System,
        format!(
            "今天是 {}。\n现在是 {}。",
            now.format("%Y-%m-%d"),
            now.format("%H:%M:%S")
        ),
    )
}
