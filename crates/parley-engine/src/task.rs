// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-request generation state machine.
//!
//! ```text
//! LOAD -> RECORD_USER -> BUILD_REQUEST -> STREAM_OPEN -> RELAY -> FINALIZE -> DONE
//!   \________________________\_______________\____________\-> ERROR -> DONE
//!                                                          \-> CANCELLED
//! ```
//!
//! Terminal bookkeeping (closing the upstream stream and terminating the
//! registry entry) happens on every path when the task value is dropped.

use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use futures::StreamExt;
use parley_core::types::{
    ChatMessage, CompletionRequest, ConversationId, GenerationEvent, MessageId, ModelEntry, Role,
    StoredMessage, UserId, DEFAULT_CONVERSATION_TITLE,
};
use parley_core::{ChatStore, LlmClient, ParleyError};
use parley_markers::{base64, model, think};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::history;
use crate::naming::ConversationNamer;
use crate::pool::WorkerPool;
use crate::registry::EntryLease;
use crate::summary;
use crate::vision::VisionDescriber;

/// States of a generation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Load,
    RecordUser,
    BuildRequest,
    StreamOpen,
    Relay,
    Finalize,
    Cancelled,
    Error,
    Done,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Load => write!(f, "load"),
            TaskState::RecordUser => write!(f, "record_user"),
            TaskState::BuildRequest => write!(f, "build_request"),
            TaskState::StreamOpen => write!(f, "stream_open"),
            TaskState::Relay => write!(f, "relay"),
            TaskState::Finalize => write!(f, "finalize"),
            TaskState::Cancelled => write!(f, "cancelled"),
            TaskState::Error => write!(f, "error"),
            TaskState::Done => write!(f, "done"),
        }
    }
}

/// Everything a task needs to know about the request it serves.
///
/// Built by the engine after pricing and debit succeeded.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub user_id: UserId,
    pub conversation_id: ConversationId,
    pub user_message_id: MessageId,
    pub assistant_message_id: MessageId,
    pub prompt: String,
    /// Image payload as received from the client; empty for none.
    pub image: String,
    pub model: ModelEntry,
    /// Upstream id actually streamed from.
    pub upstream_model: String,
}

/// Collaborators shared by every task.
#[derive(Clone)]
pub(crate) struct TaskContext {
    pub store: Arc<dyn ChatStore>,
    pub llm: Arc<dyn LlmClient>,
    pub vision: VisionDescriber,
    pub namer: Arc<ConversationNamer>,
    pub pool: WorkerPool,
}

/// Accumulated output of the relay loop.
#[derive(Debug, Default)]
struct Transcript {
    content: String,
    reasoning: String,
    reasoning_elapsed: u64,
}

pub(crate) struct GenerationTask {
    ctx: TaskContext,
    job: GenerationJob,
    lease: EntryLease,
    state: TaskState,
}

impl GenerationTask {
    pub fn new(ctx: TaskContext, job: GenerationJob, lease: EntryLease) -> Self {
        Self {
            ctx,
            job,
            lease,
            state: TaskState::Load,
        }
    }

    /// Drives the task to a terminal state and returns it.
    pub async fn run(mut self, cancel: CancellationToken) -> TaskState {
        let conversation_id = self.job.conversation_id;
        info!(
            conversation_id,
            user_id = self.job.user_id,
            model = %self.job.upstream_model,
            "generation started"
        );

        let state = match self.drive(&cancel).await {
            Ok(state) => state,
            Err(message) => {
                self.enter(TaskState::Error);
                warn!(conversation_id, error = %message, "generation failed");
                self.lease.emit(GenerationEvent::failure(message));
                TaskState::Done
            }
        };
        self.enter(state);
        info!(conversation_id, state = %state, "generation finished");
        state
    }

    fn enter(&mut self, next: TaskState) {
        if self.state != next {
            debug!(
                conversation_id = self.job.conversation_id,
                from = %self.state,
                to = %next,
                "task state transition"
            );
            self.state = next;
        }
    }

    async fn drive(&mut self, cancel: &CancellationToken) -> Result<TaskState, String> {
        let conversation_id = self.job.conversation_id;

        self.enter(TaskState::Load);
        if cancel.is_cancelled() {
            return Ok(TaskState::Cancelled);
        }
        let stored = self
            .ctx
            .store
            .load_history(conversation_id)
            .await
            .map_err(|e| format!("ERROR:{e}"))?;

        self.enter(TaskState::RecordUser);
        let user_content = if self.job.image.is_empty() {
            self.job.prompt.clone()
        } else {
            base64::encode(&self.job.image, &self.job.prompt)
        };
        self.ctx
            .store
            .append_message(&StoredMessage::now(
                self.job.user_message_id,
                conversation_id,
                Role::User,
                user_content,
                String::new(),
            ))
            .await
            .map_err(|e| format!("ERROR:{e}"))?;

        self.enter(TaskState::BuildRequest);
        let mut messages = Vec::with_capacity(stored.len() + 2);
        messages.push(history::system_prompt(Local::now()));
        messages.extend(history::sanitize(&stored));
        let user_turn = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(TaskState::Cancelled),
            turn = self.user_turn() => turn,
        };
        messages.push(user_turn);
        let request = CompletionRequest {
            model: self.job.upstream_model.clone(),
            messages,
        };

        self.enter(TaskState::StreamOpen);
        let mut stream = match self.ctx.llm.stream(request, cancel.clone()).await {
            Ok(stream) => stream,
            Err(ParleyError::Cancelled) => return Ok(TaskState::Cancelled),
            Err(e) => return Err(format!("ERROR: failed to create stream: {e}")),
        };
        let opened = Instant::now();

        self.enter(TaskState::Relay);
        let mut transcript = Transcript::default();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(TaskState::Cancelled),
                next = stream.next() => next,
            };
            match next {
                None => break,
                Some(Err(ParleyError::Cancelled)) => return Ok(TaskState::Cancelled),
                Some(Err(e)) => return Err(format!("ERROR:{e}")),
                Some(Ok(delta)) => {
                    if let Some(reasoning) = delta.reasoning.filter(|r| !r.is_empty()) {
                        let elapsed = opened.elapsed().as_secs();
                        transcript.reasoning.push_str(&reasoning);
                        transcript.reasoning_elapsed = elapsed;
                        self.lease.emit(GenerationEvent::reasoning(
                            think::encode(elapsed, &reasoning),
                            reasoning,
                            elapsed,
                        ));
                    }
                    if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                        transcript.content.push_str(&content);
                        self.lease.emit(GenerationEvent::content(content));
                    }
                }
            }
        }
        drop(stream);

        self.enter(TaskState::Finalize);
        self.finalize(transcript).await;
        Ok(TaskState::Done)
    }

    async fn user_turn(&self) -> ChatMessage {
        let job = &self.job;
        if job.image.is_empty() {
            return ChatMessage::text(Role::User, job.prompt.clone());
        }
        if job.model.image.accepts_images() {
            return ChatMessage {
                role: Role::User,
                content: job.prompt.clone(),
                reasoning_content: None,
                image_url: Some(job.image.clone()),
            };
        }
        let description = self.ctx.vision.describe(&job.image, &job.prompt).await;
        ChatMessage::text(Role::User, format!("{}\n\n{description}", job.prompt))
    }

    /// Persists the reply and refreshes conversation metadata.
    ///
    /// Every failure here is logged and swallowed; the client already has
    /// the reply.
    async fn finalize(&self, transcript: Transcript) {
        let conversation_id = self.job.conversation_id;
        let store = &self.ctx.store;

        let reasoning_content = if transcript.reasoning.is_empty() {
            String::new()
        } else {
            think::encode(transcript.reasoning_elapsed, &transcript.reasoning)
        };
        let reply = StoredMessage::now(
            self.job.assistant_message_id,
            conversation_id,
            Role::Assistant,
            model::encode(&self.job.upstream_model, &transcript.content),
            reasoning_content,
        );
        if let Err(e) = store.append_message(&reply).await {
            warn!(conversation_id, error = %e, "failed to persist assistant reply");
        }

        match store.load_history(conversation_id).await {
            Ok(history) => {
                if let Some(summary) = summary::conversation_summary(&history) {
                    if let Err(e) = store
                        .update_conversation_summary(conversation_id, &summary)
                        .await
                    {
                        warn!(conversation_id, error = %e, "failed to update summary");
                    }
                }
            }
            Err(e) => warn!(conversation_id, error = %e, "failed to reload history"),
        }

        match store.conversation_title(conversation_id).await {
            Ok(Some(title)) if title == DEFAULT_CONVERSATION_TITLE => {
                let namer = Arc::clone(&self.ctx.namer);
                self.ctx.pool.spawn_background(move |token| async move {
                    namer.run(conversation_id, token).await;
                });
            }
            Ok(_) => {}
            Err(e) => warn!(conversation_id, error = %e, "failed to read title"),
        }
    }
}
