// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming generation engine.
//!
//! [`GenerationEngine`] prices and debits a request, then either registers a
//! new generation for the conversation and admits its task to the worker
//! pool, or joins the generation already running. Either way the caller
//! receives a [`Subscription`] that replays every retained event and then
//! follows the live tail until the task terminates.

pub mod history;
pub mod naming;
pub mod pool;
pub mod registry;
pub mod summary;
pub mod task;
pub mod vision;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parley_config::model::EngineConfig;
use parley_core::types::{ConversationId, GenerationEvent, MessageId, ModelEntry, UserAccount, UserId};
use parley_core::{ChatStore, LlmClient, ParleyError};
use parley_cost::{charge, quote_generation, ChargeReason};
use tracing::{info, warn};

pub use naming::ConversationNamer;
pub use pool::WorkerPool;
pub use registry::{Admission, GenerationRegistry, RegistryEntry, Subscription};
pub use task::{GenerationJob, TaskState};
pub use vision::VisionDescriber;

use crate::task::{GenerationTask, TaskContext};

/// A generate call as received from a client.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub conversation_id: ConversationId,
    pub user_message_id: MessageId,
    pub assistant_message_id: MessageId,
    pub prompt: String,
    /// Catalog model name (or upstream id).
    pub model: String,
    /// Attached image payload; empty for none.
    pub image: String,
    pub reasoning: bool,
}

/// The caller's view of a generation.
pub struct GenerationStream {
    /// Whether the caller joined a generation that was already running.
    pub joined: bool,
    pub subscription: Subscription,
}

/// Ports and settings the engine is built from.
pub struct EngineParts {
    pub store: Arc<dyn ChatStore>,
    /// Primary endpoint for generation.
    pub llm: Arc<dyn LlmClient>,
    /// Secondary endpoint for naming and image description.
    pub secondary: Arc<dyn LlmClient>,
    pub models: Vec<ModelEntry>,
    pub engine: EngineConfig,
    pub naming_model: String,
    pub vision_model: String,
}

/// Process-wide generation engine. Construct once at startup and share.
pub struct GenerationEngine {
    models: Vec<ModelEntry>,
    registry: GenerationRegistry,
    ctx: TaskContext,
}

impl GenerationEngine {
    pub fn new(parts: EngineParts) -> Self {
        let pool = WorkerPool::new(parts.engine.workers, parts.engine.queue_high_water);
        let namer = Arc::new(ConversationNamer::new(
            Arc::clone(&parts.store),
            Arc::clone(&parts.secondary),
            parts.naming_model,
        ));
        let vision = VisionDescriber::new(parts.secondary, parts.vision_model);
        info!(
            workers = parts.engine.workers,
            queue_high_water = parts.engine.queue_high_water,
            replay_cap = parts.engine.replay_cap,
            models = parts.models.len(),
            "generation engine initialized"
        );
        Self {
            models: parts.models,
            registry: GenerationRegistry::new(parts.engine.replay_cap),
            ctx: TaskContext {
                store: parts.store,
                llm: parts.llm,
                vision,
                namer,
                pool,
            },
        }
    }

    /// Finds a catalog entry by display name, then by upstream id.
    pub fn find_model(&self, selector: &str) -> Option<&ModelEntry> {
        ModelEntry::lookup(&self.models, selector)
    }

    /// Prices, debits, and starts or joins a generation.
    ///
    /// Every call is debited, including calls that join a running
    /// generation. Credits are not refunded if the generation later fails
    /// or is stopped.
    pub async fn start(
        &self,
        user: &UserAccount,
        request: GenerateRequest,
    ) -> Result<GenerationStream, ParleyError> {
        let conversation_id = request.conversation_id;
        let model = self
            .find_model(&request.model)
            .cloned()
            .ok_or_else(|| ParleyError::ModelNotSupported(request.model.clone()))?;

        match self.ctx.store.conversation(conversation_id).await? {
            Some(conversation) if conversation.user_id == user.id => {}
            _ => return Err(ParleyError::NotFound(format!("conversation {conversation_id}"))),
        }

        let quote = quote_generation(&model, request.reasoning, user, Utc::now())?;
        charge(
            self.ctx.store.as_ref(),
            user.id,
            quote.cost,
            ChargeReason::Generation,
        )
        .await?;

        let lease = match self.registry.acquire_or_join(conversation_id, user.id) {
            Admission::Existing(entry) => {
                info!(conversation_id, user_id = user.id, "joined running generation");
                return Ok(GenerationStream {
                    joined: true,
                    subscription: entry.subscribe(),
                });
            }
            Admission::New(lease) => lease,
        };
        let subscription = lease.entry().subscribe();

        let slot = match self.ctx.pool.reserve() {
            Ok(slot) => slot,
            Err(e) => {
                warn!(conversation_id, error = %e, "generation not admitted");
                lease.emit(GenerationEvent::failure(e.to_string()));
                lease.terminate();
                return Err(e);
            }
        };

        let parent = lease.entry().cancel_token().clone();
        let job = GenerationJob {
            user_id: user.id,
            conversation_id,
            user_message_id: request.user_message_id,
            assistant_message_id: request.assistant_message_id,
            prompt: request.prompt,
            image: request.image,
            model,
            upstream_model: quote.upstream_model,
        };
        let task = GenerationTask::new(self.ctx.clone(), job, lease);
        slot.spawn(&parent, move |token| async move {
            task.run(token).await;
        });

        Ok(GenerationStream {
            joined: false,
            subscription,
        })
    }

    /// Cancels the caller's running generation for `conversation_id`.
    ///
    /// Returns `false` when none is running. Repeated calls are harmless.
    pub fn stop(&self, user_id: UserId, conversation_id: ConversationId) -> bool {
        let stopped = self.registry.cancel_owned(conversation_id, user_id);
        if stopped {
            info!(conversation_id, user_id, "generation stop requested");
        }
        stopped
    }

    /// Conversations of `user_id` with a running generation.
    pub fn thread_list(&self, user_id: UserId) -> Vec<ConversationId> {
        self.registry.conversations_for_user(user_id)
    }

    pub fn is_generating(&self, conversation_id: ConversationId) -> bool {
        self.registry.contains(conversation_id)
    }

    pub fn active_generations(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &GenerationRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.ctx.pool
    }

    /// Cancels all generations and background work and waits for them.
    pub async fn shutdown(&self, timeout: Duration) {
        self.ctx.pool.shutdown(timeout).await;
    }
}
