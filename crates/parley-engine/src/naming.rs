// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background conversation naming.

use std::sync::Arc;

use parley_core::types::{ChatMessage, CompletionRequest, ConversationId, Role};
use parley_core::{ChatStore, LlmClient, ParleyError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::history;

/// Maximum title length in characters.
pub const TITLE_CHARS: usize = 15;

const NAMING_PROMPT: &str = "请总结概括对话内容，生成一个对话标题，不超过15字，不要使用 Emoji 和 Konomoji，不要使用 markdown，不要输出其他内容，仅需对话标题内容，不需前缀。";

/// Writes a title for a conversation from its history.
pub struct ConversationNamer {
    store: Arc<dyn ChatStore>,
    client: Arc<dyn LlmClient>,
    model: String,
}

impl ConversationNamer {
    pub fn new(store: Arc<dyn ChatStore>, client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            store,
            client,
            model: model.into(),
        }
    }

    /// Best-effort rename; failures leave the title unchanged.
    pub async fn run(&self, conversation_id: ConversationId, cancel: CancellationToken) {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(ParleyError::Cancelled),
            result = self.name(conversation_id) => result,
        };
        match outcome {
            Ok(Some(title)) => info!(conversation_id, %title, "conversation renamed"),
            Ok(None) => debug!(conversation_id, "naming produced an empty title"),
            Err(e) => warn!(conversation_id, error = %e, "conversation naming failed"),
        }
    }

    async fn name(&self, conversation_id: ConversationId) -> Result<Option<String>, ParleyError> {
        let stored = self.store.load_history(conversation_id).await?;
        let mut messages = history::sanitize(&stored);
        messages.push(ChatMessage::text(Role::User, NAMING_PROMPT));

        let response = self
            .client
            .complete(CompletionRequest {
                model: self.model.clone(),
                messages,
            })
            .await?;

        let title = normalize_title(&response.content);
        if title.is_empty() {
            return Ok(None);
        }
        self.store.rename_conversation(conversation_id, &title).await?;
        Ok(Some(title))
    }
}

/// Trims surrounding whitespace and quotes, then caps at [`TITLE_CHARS`].
pub fn normalize_title(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '"' || c == '“' || c == '”' || c == '《' || c == '》')
        .trim()
        .chars()
        .take(TITLE_CHARS)
        .collect()
}
