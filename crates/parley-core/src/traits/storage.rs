// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence port for users, conversations, and messages.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Conversation, ConversationId, DebitOutcome, MessageId, StoredMessage, UserAccount, UserId,
};

/// Persistence backend consumed by the engine and the gateway.
///
/// Message rows for a conversation are written by one generation task at a
/// time; implementations only need to guarantee that `debit_credits` is
/// atomic with respect to concurrent debits for the same user.
#[async_trait]
pub trait ChatStore: PluginAdapter {
    /// Opens connections and applies migrations.
    async fn initialize(&self) -> Result<(), ParleyError>;

    /// Flushes pending writes and releases connections.
    async fn close(&self) -> Result<(), ParleyError>;

    // --- Users and credits ---

    async fn user(&self, user_id: UserId) -> Result<Option<UserAccount>, ParleyError>;

    /// Resolves an API bearer token to its owner.
    async fn user_by_token(&self, token: &str) -> Result<Option<UserAccount>, ParleyError>;

    /// Atomically subtracts `amount` credits if and only if the balance
    /// stays non-negative. `reason` is recorded alongside the charge.
    async fn debit_credits(
        &self,
        user_id: UserId,
        amount: i64,
        reason: &str,
    ) -> Result<DebitOutcome, ParleyError>;

    // --- Conversations ---

    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), ParleyError>;

    async fn conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<Conversation>, ParleyError>;

    /// Conversations owned by `user_id`, most recently updated first.
    async fn list_conversations(&self, user_id: UserId)
    -> Result<Vec<Conversation>, ParleyError>;

    /// Deletes a conversation and its messages.
    async fn delete_conversation(&self, conversation_id: ConversationId)
    -> Result<(), ParleyError>;

    async fn conversation_title(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<String>, ParleyError>;

    async fn rename_conversation(
        &self,
        conversation_id: ConversationId,
        title: &str,
    ) -> Result<(), ParleyError>;

    async fn update_conversation_summary(
        &self,
        conversation_id: ConversationId,
        summary: &str,
    ) -> Result<(), ParleyError>;

    // --- Messages ---

    /// Full history of a conversation in dialogue order.
    async fn load_history(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<StoredMessage>, ParleyError>;

    /// Inserts a message, or replaces the content of a retried one.
    ///
    /// Fails with [`ParleyError::MessageIdConflict`] when the id already
    /// belongs to a different conversation.
    async fn append_message(&self, message: &StoredMessage) -> Result<(), ParleyError>;

    async fn message(&self, message_id: MessageId) -> Result<Option<StoredMessage>, ParleyError>;

    async fn delete_message(&self, message_id: MessageId) -> Result<(), ParleyError>;

    // --- Shares ---

    /// Records a share link over `message_ids`, kept in the given order,
    /// and returns its id.
    async fn create_share(
        &self,
        user_id: UserId,
        message_ids: &[MessageId],
    ) -> Result<String, ParleyError>;

    /// Messages behind a live share link; `None` when the link is unknown
    /// or expired.
    async fn shared_messages(
        &self,
        share_id: &str,
    ) -> Result<Option<Vec<StoredMessage>>, ParleyError>;
}
