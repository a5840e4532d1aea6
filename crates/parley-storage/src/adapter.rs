// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`ChatStore`] port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use parley_config::model::StorageConfig;
use parley_core::types::{
    Conversation, ConversationId, DebitOutcome, MessageId, StoredMessage, UserAccount, UserId,
};
use parley_core::{AdapterType, ChatStore, HealthStatus, ParleyError, PluginAdapter};

use crate::database::{map_tr_err, Database};
use crate::queries;

/// SQLite-backed store.
///
/// The database is opened by [`ChatStore::initialize`]; every other call
/// fails until then.
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, ParleyError> {
        self.db.get().ok_or_else(|| ParleyError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Create an account. Account management lives outside the chat core;
    /// this exists for provisioning and tests.
    pub async fn create_user(
        &self,
        username: &str,
        api_token: Option<&str>,
        points: i64,
    ) -> Result<UserAccount, ParleyError> {
        queries::users::create_user(self.db()?, username, api_token, points).await
    }

    pub async fn set_membership(
        &self,
        user_id: UserId,
        level: &str,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), ParleyError> {
        queries::users::set_membership(self.db()?, user_id, level, until).await
    }

    /// Ledger rows of a user, oldest first. Test builds only.
    #[cfg(any(test, feature = "test-support"))]
    pub async fn ledger(
        &self,
        user_id: UserId,
    ) -> Result<Vec<queries::ledger::LedgerEntry>, ParleyError> {
        queries::ledger::entries_for_user(self.db()?, user_id).await
    }

    async fn checkpoint(&self, db: &Database) -> Result<(), ParleyError> {
        db.connection()
            .call(|conn| conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);"))
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        self.db()?
            .connection()
            .call(|conn| conn.execute_batch("SELECT 1;"))
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        match self.db.get() {
            Some(db) => self.checkpoint(db).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChatStore for SqliteStore {
    async fn initialize(&self) -> Result<(), ParleyError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| ParleyError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ParleyError> {
        self.checkpoint(self.db()?).await
    }

    async fn user(&self, user_id: UserId) -> Result<Option<UserAccount>, ParleyError> {
        queries::users::get_user(self.db()?, user_id).await
    }

    async fn user_by_token(&self, token: &str) -> Result<Option<UserAccount>, ParleyError> {
        queries::users::get_user_by_token(self.db()?, token).await
    }

    async fn debit_credits(
        &self,
        user_id: UserId,
        amount: i64,
        reason: &str,
    ) -> Result<DebitOutcome, ParleyError> {
        queries::ledger::debit(self.db()?, user_id, amount, reason).await
    }

    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), ParleyError> {
        queries::conversations::create_conversation(self.db()?, conversation).await
    }

    async fn conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<Conversation>, ParleyError> {
        queries::conversations::get_conversation(self.db()?, conversation_id).await
    }

    async fn list_conversations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Conversation>, ParleyError> {
        queries::conversations::list_conversations(self.db()?, user_id).await
    }

    async fn delete_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<(), ParleyError> {
        queries::conversations::delete_conversation(self.db()?, conversation_id).await
    }

    async fn conversation_title(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<String>, ParleyError> {
        queries::conversations::get_title(self.db()?, conversation_id).await
    }

    async fn rename_conversation(
        &self,
        conversation_id: ConversationId,
        title: &str,
    ) -> Result<(), ParleyError> {
        queries::conversations::rename(self.db()?, conversation_id, title).await
    }

    async fn update_conversation_summary(
        &self,
        conversation_id: ConversationId,
        summary: &str,
    ) -> Result<(), ParleyError> {
        queries::conversations::update_summary(self.db()?, conversation_id, summary).await
    }

    async fn load_history(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<StoredMessage>, ParleyError> {
        queries::messages::load_history(self.db()?, conversation_id).await
    }

    async fn append_message(&self, message: &StoredMessage) -> Result<(), ParleyError> {
        queries::messages::append_message(self.db()?, message).await
    }

    async fn message(&self, message_id: MessageId) -> Result<Option<StoredMessage>, ParleyError> {
        queries::messages::get_message(self.db()?, message_id).await
    }

    async fn delete_message(&self, message_id: MessageId) -> Result<(), ParleyError> {
        queries::messages::delete_message(self.db()?, message_id).await
    }

    async fn create_share(
        &self,
        user_id: UserId,
        message_ids: &[MessageId],
    ) -> Result<String, ParleyError> {
        queries::shares::create_share(self.db()?, user_id, message_ids).await
    }

    async fn shared_messages(
        &self,
        share_id: &str,
    ) -> Result<Option<Vec<StoredMessage>>, ParleyError> {
        queries::shares::shared_messages(self.db()?, share_id).await
    }
}
