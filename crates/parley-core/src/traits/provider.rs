// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM client port.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use tokio_util::sync::CancellationToken;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CompletionRequest, CompletionResponse, StreamDelta};

/// Stream of incremental deltas from an open upstream completion.
///
/// Dropping the stream closes the upstream connection.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<StreamDelta, ParleyError>> + Send>>;

/// Access to an upstream chat-completion endpoint.
#[async_trait]
pub trait LlmClient: PluginAdapter {
    /// Sends a request and waits for the full reply.
    ///
    /// Used for conversation naming and image description.
    async fn complete(&self, request: CompletionRequest)
    -> Result<CompletionResponse, ParleyError>;

    /// Opens a streaming completion.
    ///
    /// Returns [`ParleyError::Cancelled`] if `cancel` fires before the
    /// stream is established.
    async fn stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<DeltaStream, ParleyError>;
}
