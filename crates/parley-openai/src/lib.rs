// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible provider for Parley.
//!
//! Implements [`LlmClient`] over the `/chat/completions` endpoint, both
//! streaming (SSE) and single-shot. The same type serves the primary
//! generation endpoint and the secondary naming/vision endpoint.

pub mod client;
pub mod sse;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use parley_config::model::{SecondaryConfig, UpstreamConfig};
use parley_core::types::{
    AdapterType, ChatMessage, CompletionRequest, CompletionResponse, HealthStatus,
};
use parley_core::{DeltaStream, LlmClient, ParleyError, PluginAdapter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::OpenAiClient;
use crate::types::{ChatCompletionRequest, ContentPart, ImageUrl, WireContent, WireMessage};

/// An OpenAI-compatible upstream.
///
/// API key resolution order: config, then `OPENAI_API_KEY`, then error.
pub struct OpenAiProvider {
    label: &'static str,
    client: OpenAiClient,
}

impl OpenAiProvider {
    /// Provider for the primary generation endpoint.
    pub fn from_upstream(config: &UpstreamConfig) -> Result<Self, ParleyError> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let client = OpenAiClient::new(
            &api_key,
            &config.api_base,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        info!(api_base = %config.api_base, "upstream provider initialized");
        Ok(Self {
            label: "openai-upstream",
            client,
        })
    }

    /// Provider for the secondary endpoint, inheriting unset fields from the
    /// primary one.
    pub fn from_secondary(
        secondary: &SecondaryConfig,
        upstream: &UpstreamConfig,
    ) -> Result<Self, ParleyError> {
        let api_base = secondary.api_base.as_deref().unwrap_or(&upstream.api_base);
        let api_key =
            resolve_api_key(secondary.api_key.as_deref().or(upstream.api_key.as_deref()))?;
        let client = OpenAiClient::new(
            &api_key,
            api_base,
            Duration::from_secs(upstream.timeout_secs),
            upstream.max_retries,
        )?;
        info!(api_base = %api_base, "secondary provider initialized");
        Ok(Self {
            label: "openai-secondary",
            client,
        })
    }
}

fn to_wire(request: &CompletionRequest) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: request.model.clone(),
        messages: request.messages.iter().map(to_wire_message).collect(),
        stream: false,
    }
}

fn to_wire_message(message: &ChatMessage) -> WireMessage {
    let content = match &message.image_url {
        Some(url) => WireContent::Parts(vec![
            ContentPart::Text {
                text: message.content.clone(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl { url: url.clone() },
            },
        ]),
        None => WireContent::Text(message.content.clone()),
    };
    WireMessage {
        role: message.role.to_string(),
        content,
        reasoning_content: message.reasoning_content.clone(),
    }
}

fn resolve_api_key(config_key: Option<&str>) -> Result<String, ParleyError> {
    if let Some(key) = config_key.filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }

    std::env::var("OPENAI_API_KEY").map_err(|_| {
        ParleyError::Config(
            "API key not found. Set upstream.api_key in config or the OPENAI_API_KEY environment variable.".into(),
        )
    })
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        self.label
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        // Probing the endpoint would spend tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        debug!(provider = self.label, "provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl LlmClient for OpenAiProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ParleyError> {
        let response = self.client.complete_chat(&to_wire(&request)).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ParleyError::Provider {
                message: "completion returned no choices".into(),
                source: None,
            })?;
        let model = if response.model.is_empty() {
            request.model
        } else {
            response.model
        };
        Ok(CompletionResponse { content, model })
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<DeltaStream, ParleyError> {
        let wire = to_wire(&request);
        tokio::select! {
            _ = cancel.cancelled() => Err(ParleyError::Cancelled),
            opened = self.client.stream_chat(&wire) => opened,
        }
    }
}
