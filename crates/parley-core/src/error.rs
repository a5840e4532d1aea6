// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley chat backend.

use thiserror::Error;

/// The primary error type used across all Parley ports and core operations.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Upstream LLM errors (connection failure, bad status, malformed stream).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The caller's balance does not cover the requested charge.
    #[error("积分不足")]
    InsufficientCredits,

    /// The requested model is not in the catalog.
    #[error("ERROR: model not supported:{0}")]
    ModelNotSupported(String),

    /// Reasoning was requested for a model without a reasoning variant.
    #[error("ERROR: model does not support reasoning:{0}")]
    ModelDoesNotSupportReasoning(String),

    /// An active membership carries a level with no tariff.
    #[error("未知 MemberLevel")]
    UnknownMemberLevel(String),

    /// A referenced entity does not exist or is not visible to the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// A client-chosen message id already belongs to another conversation.
    #[error("message id already in use: {0}")]
    MessageIdConflict(i64),

    /// Missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// The worker pool queue is above its high-water mark.
    #[error("generation queue is full")]
    PoolSaturated,

    /// The operation observed cancellation.
    #[error("cancelled")]
    Cancelled,

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// Returns true for errors caused by the request itself rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ParleyError::InsufficientCredits
                | ParleyError::ModelNotSupported(_)
                | ParleyError::ModelDoesNotSupportReasoning(_)
                | ParleyError::UnknownMemberLevel(_)
                | ParleyError::NotFound(_)
                | ParleyError::MessageIdConflict(_)
                | ParleyError::Unauthorized
        )
    }

    /// HTTP status code the gateway answers with when this error rejects a
    /// request outright.
    pub fn http_status(&self) -> u16 {
        match self {
            ParleyError::Unauthorized => 401,
            ParleyError::PoolSaturated => 503,
            e if e.is_client_error() => 400,
            _ => 500,
        }
    }
}
