// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley chat backend.
//!
//! This crate provides the error type, the domain types, and the two ports
//! the streaming generation engine is written against: [`ChatStore`] for
//! persistence and [`LlmClient`] for upstream model access.

pub mod error;
pub mod ids;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ParleyError;
pub use ids::SnowflakeGenerator;
pub use types::{
    AdapterType, ConversationId, HealthStatus, MessageId, Role, UserId,
    DEFAULT_CONVERSATION_TITLE,
};

pub use traits::{ChatStore, DeltaStream, LlmClient, PluginAdapter};
