// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for engine and gateway integration tests.
//!
//! `TestHarness` assembles a temp SQLite store seeded with one user and one
//! conversation, two scripted LLM clients, and a `GenerationEngine` wired
//! to them.

use std::sync::Arc;

use chrono::{Duration, Utc};
use parley_config::model::{EngineConfig, ParleyConfig, StorageConfig};
use parley_core::types::{
    Conversation, ConversationId, GenerationEvent, ImageCapability, ModelEntry, StoredMessage,
    UserAccount, DEFAULT_CONVERSATION_TITLE,
};
use parley_core::{ChatStore, LlmClient, ParleyError, SnowflakeGenerator};
use parley_engine::{EngineParts, GenerateRequest, GenerationEngine};
use parley_storage::SqliteStore;

use crate::mock_llm::MockLlm;

/// Bearer token of the seeded user.
pub const TEST_API_TOKEN: &str = "test-token";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    points: i64,
    membership: Option<String>,
    models: Vec<ModelEntry>,
    engine: EngineConfig,
    llm: MockLlm,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            points: 100,
            membership: None,
            models: default_models(),
            engine: EngineConfig {
                workers: 4,
                queue_high_water: 16,
                replay_cap: 1024,
            },
            llm: MockLlm::new(),
        }
    }

    /// Starting balance of the seeded user.
    pub fn with_points(mut self, points: i64) -> Self {
        self.points = points;
        self
    }

    /// Gives the seeded user an active membership of `level`.
    pub fn with_membership(mut self, level: &str) -> Self {
        self.membership = Some(level.to_string());
        self
    }

    pub fn with_models(mut self, models: Vec<ModelEntry>) -> Self {
        self.models = models;
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Replaces the primary LLM client, e.g. one built with a delay.
    pub fn with_llm(mut self, llm: MockLlm) -> Self {
        self.llm = llm;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, ParleyError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| ParleyError::Storage { source: e.into() })?;
        let storage = StorageConfig {
            database_path: temp_dir.path().join("test.db").to_string_lossy().into_owned(),
            wal_mode: true,
        };
        let store = Arc::new(SqliteStore::new(storage.clone()));
        store.initialize().await?;

        let user = store
            .create_user("tester", Some(TEST_API_TOKEN), self.points)
            .await?;
        if let Some(level) = &self.membership {
            store
                .set_membership(user.id, level, Some(Utc::now() + Duration::days(30)))
                .await?;
        }

        let ids = SnowflakeGenerator::new(1);
        let conversation_id = ids.next_id()?;
        store
            .create_conversation(&new_conversation(conversation_id, user.id))
            .await?;

        let llm = Arc::new(self.llm);
        let secondary = Arc::new(MockLlm::new());
        let config = ParleyConfig {
            storage,
            engine: self.engine.clone(),
            models: self.models.clone(),
            ..ParleyConfig::default()
        };
        let engine = Arc::new(GenerationEngine::new(EngineParts {
            store: Arc::clone(&store) as Arc<dyn ChatStore>,
            llm: Arc::clone(&llm) as Arc<dyn LlmClient>,
            secondary: Arc::clone(&secondary) as Arc<dyn LlmClient>,
            models: self.models,
            engine: self.engine,
            naming_model: config.secondary.naming_model.clone(),
            vision_model: config.secondary.vision_model.clone(),
        }));

        let user = store.user(user.id).await?.unwrap_or(user);
        Ok(TestHarness {
            store,
            llm,
            secondary,
            engine,
            config,
            user,
            conversation_id,
            ids,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with scripted LLMs and temp storage.
pub struct TestHarness {
    /// SQLite store (temp DB, cleaned up on drop).
    pub store: Arc<SqliteStore>,
    /// Primary, streaming LLM client.
    pub llm: Arc<MockLlm>,
    /// Secondary LLM client used for naming and image description.
    pub secondary: Arc<MockLlm>,
    pub engine: Arc<GenerationEngine>,
    pub config: ParleyConfig,
    /// The seeded user as it was after setup.
    pub user: UserAccount,
    /// The seeded conversation, titled with the default sentinel.
    pub conversation_id: ConversationId,
    ids: SnowflakeGenerator,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Fresh time-ordered id.
    pub fn next_id(&self) -> i64 {
        self.ids.next_id().unwrap_or_default()
    }

    /// A generate request against the seeded conversation with fresh
    /// message ids.
    pub fn request(&self, model: &str, prompt: &str) -> GenerateRequest {
        GenerateRequest {
            conversation_id: self.conversation_id,
            user_message_id: self.next_id(),
            assistant_message_id: self.next_id(),
            prompt: prompt.to_string(),
            model: model.to_string(),
            image: String::new(),
            reasoning: false,
        }
    }

    /// Runs a generation to completion and collects every event.
    pub async fn generate(
        &self,
        request: GenerateRequest,
    ) -> Result<Vec<GenerationEvent>, ParleyError> {
        let mut stream = self.engine.start(&self.user, request).await?;
        let mut events = Vec::new();
        while let Some(event) = stream.subscription.next_event().await {
            events.push(event);
        }
        Ok(events)
    }

    /// Current balance of the seeded user.
    pub async fn points(&self) -> Result<i64, ParleyError> {
        Ok(self
            .store
            .user(self.user.id)
            .await?
            .map(|u| u.points)
            .unwrap_or_default())
    }

    pub async fn history(&self) -> Result<Vec<StoredMessage>, ParleyError> {
        self.store.load_history(self.conversation_id).await
    }

    /// Creates another conversation owned by the seeded user.
    pub async fn new_conversation(&self) -> Result<ConversationId, ParleyError> {
        let id = self.ids.next_id()?;
        self.store
            .create_conversation(&new_conversation(id, self.user.id))
            .await?;
        Ok(id)
    }

    /// Seeds another account holding `points`, with API token
    /// `<username>-token` and one conversation of its own.
    pub async fn other_user(
        &self,
        username: &str,
        points: i64,
    ) -> Result<(UserAccount, ConversationId), ParleyError> {
        let token = format!("{username}-token");
        let user = self.store.create_user(username, Some(token.as_str()), points).await?;
        let id = self.ids.next_id()?;
        self.store
            .create_conversation(&new_conversation(id, user.id))
            .await?;
        Ok((user, id))
    }

    /// Waits until background work (naming) has drained.
    pub async fn settle(&self) {
        for _ in 0..100 {
            if self.engine.active_generations() == 0 && self.llm.streams_open() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}

fn new_conversation(id: ConversationId, user_id: i64) -> Conversation {
    let now = parley_core::types::timestamp_now();
    Conversation {
        id,
        user_id,
        title: DEFAULT_CONVERSATION_TITLE.to_string(),
        summary: String::new(),
        created_at: now.clone(),
        updated_at: now,
    }
}

/// Catalog used unless a test overrides it:
///
/// | name    | id        | points | reasoning   | image |
/// |---------|-----------|--------|-------------|-------|
/// | Chat    | chat-1    | 3      |             | none  |
/// | Thinker | think-1   | 4      | think-1-r   | none  |
/// | Vision  | vision-1  | 1      |             | input |
pub fn default_models() -> Vec<ModelEntry> {
    vec![
        ModelEntry {
            name: "Chat".into(),
            id: "chat-1".into(),
            points: 3,
            reasoning: String::new(),
            image: ImageCapability::None,
            tools: false,
        },
        ModelEntry {
            name: "Thinker".into(),
            id: "think-1".into(),
            points: 4,
            reasoning: "think-1-r".into(),
            image: ImageCapability::None,
            tools: false,
        },
        ModelEntry {
            name: "Vision".into(),
            id: "vision-1".into(),
            points: 1,
            reasoning: String::new(),
            image: ImageCapability::Input,
            tools: false,
        },
    ]
}
