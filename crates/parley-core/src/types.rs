// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the ports, the engine, and the HTTP gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// 64-bit time-ordered conversation identifier.
pub type ConversationId = i64;

/// 64-bit message identifier, chosen by the client.
pub type MessageId = i64;

/// 64-bit user identifier.
pub type UserId = i64;

/// Title every new conversation starts with. A conversation still carrying
/// it after its first completed reply gets renamed in the background.
pub const DEFAULT_CONVERSATION_TITLE: &str = "new conversation";

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a port.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
}

/// Author of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A message row as persisted in conversation history.
///
/// `content` and `reasoning_content` hold inline markers verbatim; see the
/// `parley-markers` crate for their syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub role: Role,
    pub content: String,
    pub reasoning_content: String,
    /// ISO 8601 timestamp with millisecond precision.
    pub created_at: String,
}

impl StoredMessage {
    /// Build a message stamped with the current time.
    pub fn now(
        id: MessageId,
        conversation_id: ConversationId,
        role: Role,
        content: String,
        reasoning_content: String,
    ) -> Self {
        Self {
            id,
            conversation_id,
            role,
            content,
            reasoning_content,
            created_at: timestamp_now(),
        }
    }
}

/// A conversation row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: UserId,
    pub title: String,
    pub summary: String,
    pub created_at: String,
    pub updated_at: String,
}

/// The credit-relevant view of a user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub username: String,
    /// Remaining credits; never negative.
    pub points: i64,
    pub is_member: bool,
    /// Raw membership level as stored (`free`, `VIP`, `SVIP`).
    pub member_level: String,
    pub member_until: Option<DateTime<Utc>>,
}

/// Result of an atomic conditional debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    /// The debit was applied; carries the balance afterwards.
    Debited { balance: i64 },
    /// The balance was left untouched because it did not cover the amount.
    Insufficient,
}

/// Image handling capability of a catalog model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageCapability {
    #[default]
    None,
    Input,
    Output,
    InputOutput,
}

impl ImageCapability {
    /// Whether the model can read images supplied in the prompt.
    pub fn accepts_images(self) -> bool {
        matches!(self, ImageCapability::Input | ImageCapability::InputOutput)
    }
}

/// One entry of the read-only model catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelEntry {
    /// Display name clients select the model by.
    pub name: String,
    /// Upstream model identifier.
    pub id: String,
    /// Base credit cost per generation.
    pub points: i64,
    /// Reasoning variant id. Empty means unsupported; equal to `id` means the
    /// model always reasons.
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub image: ImageCapability,
    #[serde(default)]
    pub tools: bool,
}

impl ModelEntry {
    /// Whether a reasoning request switches to a distinct reasoning variant.
    pub fn has_reasoning_variant(&self) -> bool {
        !self.reasoning.is_empty() && self.reasoning != self.id
    }

    /// Finds a catalog entry by display name, falling back to upstream id.
    pub fn lookup<'a>(catalog: &'a [ModelEntry], selector: &str) -> Option<&'a ModelEntry> {
        catalog
            .iter()
            .find(|m| m.name == selector)
            .or_else(|| catalog.iter().find(|m| m.id == selector))
    }
}

/// An event emitted by a generation task to its observers.
///
/// Deltas are incremental: the full reply is the concatenation of every
/// `content_delta`. `reasoning_delta` carries a complete think marker
/// wrapping the incremental reasoning text, which `reasoning_text` holds
/// verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationEvent {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_delta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_elapsed_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_delta: Option<String>,
}

impl GenerationEvent {
    pub fn content(delta: impl Into<String>) -> Self {
        Self {
            success: true,
            content_delta: Some(delta.into()),
            ..Default::default()
        }
    }

    pub fn reasoning(
        marker: impl Into<String>,
        text: impl Into<String>,
        elapsed_seconds: u64,
    ) -> Self {
        Self {
            success: true,
            reasoning_delta: Some(marker.into()),
            reasoning_text: Some(text.into()),
            reasoning_elapsed_seconds: Some(elapsed_seconds),
            ..Default::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// A single increment received from an upstream completion stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDelta {
    pub content: Option<String>,
    pub reasoning: Option<String>,
}

/// A message in an upstream completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub reasoning_content: Option<String>,
    /// Image URL (usually a `data:` URL) attached to a user turn.
    pub image_url: Option<String>,
}

impl ChatMessage {
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            reasoning_content: None,
            image_url: None,
        }
    }
}

/// A completion request sent through the LLM client port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// A single-shot completion result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
}

/// Current UTC time in the timestamp format used by persisted rows.
pub fn timestamp_now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
