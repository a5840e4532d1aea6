// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted LLM client for deterministic testing.
//!
//! `MockLlm` implements `LlmClient` with pre-configured streaming scripts
//! and single-shot replies, and records every request it receives.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use parley_core::types::{
    AdapterType, CompletionRequest, CompletionResponse, HealthStatus, StreamDelta,
};
use parley_core::{DeltaStream, LlmClient, ParleyError, PluginAdapter};

/// One step of a scripted stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockStep {
    /// Yields a content delta.
    Content(String),
    /// Yields a reasoning delta.
    Reasoning(String),
    /// Yields a stream error.
    Fail(String),
    /// Blocks until [`MockLlm::release`] is called.
    Pause,
}

impl MockStep {
    pub fn content(text: &str) -> Self {
        MockStep::Content(text.to_string())
    }

    pub fn reasoning(text: &str) -> Self {
        MockStep::Reasoning(text.to_string())
    }
}

/// A mock LLM client.
///
/// Stream scripts and completion replies are popped from FIFO queues. When
/// a queue is empty, streams yield a single "mock response" content delta
/// and completions return "mock title".
pub struct MockLlm {
    scripts: Arc<Mutex<VecDeque<Vec<MockStep>>>>,
    completions: Arc<Mutex<VecDeque<Result<String, String>>>>,
    open_failures: Arc<Mutex<VecDeque<String>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    delay: Duration,
    gate: Arc<Notify>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(Mutex::new(VecDeque::new())),
            completions: Arc::new(Mutex::new(VecDeque::new())),
            open_failures: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
            gate: Arc::new(Notify::new()),
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleeps `delay` before every scripted step.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queues the script for the next stream.
    pub async fn add_script(&self, steps: Vec<MockStep>) {
        self.scripts.lock().await.push_back(steps);
    }

    /// Queues the reply for the next completion.
    pub async fn add_completion(&self, text: &str) {
        self.completions.lock().await.push_back(Ok(text.to_string()));
    }

    /// Makes the next completion fail.
    pub async fn fail_next_completion(&self, message: &str) {
        self.completions
            .lock()
            .await
            .push_back(Err(message.to_string()));
    }

    /// Makes the next stream fail to open.
    pub async fn fail_next_open(&self, message: &str) {
        self.open_failures
            .lock()
            .await
            .push_back(message.to_string());
    }

    /// Lets one paused stream continue.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    /// Every request received so far, streaming and single-shot.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub fn streams_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Streams opened and not yet dropped.
    pub fn streams_open(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.closed.load(Ordering::SeqCst)
    }

    async fn next_script(&self) -> Vec<MockStep> {
        self.scripts
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| vec![MockStep::content("mock response")])
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts the stream as closed when dropped.
struct CloseGuard(Arc<AtomicUsize>);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptState {
    steps: VecDeque<MockStep>,
    delay: Duration,
    gate: Arc<Notify>,
    _guard: CloseGuard,
}

#[async_trait]
impl PluginAdapter for MockLlm {
    fn name(&self) -> &str {
        "mock-llm"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ParleyError> {
        let model = request.model.clone();
        self.requests.lock().await.push(request);
        let reply = self
            .completions
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok("mock title".to_string()));
        match reply {
            Ok(content) => Ok(CompletionResponse { content, model }),
            Err(message) => Err(ParleyError::Provider {
                message,
                source: None,
            }),
        }
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<DeltaStream, ParleyError> {
        self.requests.lock().await.push(request);
        if cancel.is_cancelled() {
            return Err(ParleyError::Cancelled);
        }
        if let Some(message) = self.open_failures.lock().await.pop_front() {
            return Err(ParleyError::Provider {
                message,
                source: None,
            });
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        let state = ScriptState {
            steps: self.next_script().await.into(),
            delay: self.delay,
            gate: Arc::clone(&self.gate),
            _guard: CloseGuard(Arc::clone(&self.closed)),
        };

        let deltas = stream::unfold(state, |mut state| async move {
            loop {
                let step = state.steps.pop_front()?;
                if !state.delay.is_zero() {
                    tokio::time::sleep(state.delay).await;
                }
                let item = match step {
                    MockStep::Pause => {
                        state.gate.notified().await;
                        continue;
                    }
                    MockStep::Content(text) => Ok(StreamDelta {
                        content: Some(text),
                        reasoning: None,
                    }),
                    MockStep::Reasoning(text) => Ok(StreamDelta {
                        content: None,
                        reasoning: Some(text),
                    }),
                    MockStep::Fail(message) => Err(ParleyError::Provider {
                        message,
                        source: None,
                    }),
                };
                return Some((item, state));
            }
        });
        Ok(Box::pin(deltas))
    }
}
