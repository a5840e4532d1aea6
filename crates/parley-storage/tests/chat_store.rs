// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exercises `SqliteStore` through the `ChatStore` trait object.

use std::sync::Arc;

use parley_config::model::StorageConfig;
use parley_core::types::{timestamp_now, Conversation, DebitOutcome, Role, StoredMessage};
use parley_core::{ChatStore, DEFAULT_CONVERSATION_TITLE};
use parley_storage::SqliteStore;
use tempfile::TempDir;

async fn store() -> (TempDir, Arc<SqliteStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(StorageConfig {
        database_path: dir.path().join("chat.db").to_string_lossy().into_owned(),
        wal_mode: true,
    });
    store.initialize().await.unwrap();
    (dir, Arc::new(store))
}

#[tokio::test]
async fn conversation_lifecycle_through_port() {
    let (_dir, sqlite) = store().await;
    let user = sqlite.create_user("alice", Some("tok-a"), 5).await.unwrap();
    let store: Arc<dyn ChatStore> = sqlite;

    let now = timestamp_now();
    store
        .create_conversation(&Conversation {
            id: 7,
            user_id: user.id,
            title: DEFAULT_CONVERSATION_TITLE.into(),
            summary: String::new(),
            created_at: now.clone(),
            updated_at: now,
        })
        .await
        .unwrap();

    store
        .append_message(&StoredMessage::now(
            10,
            7,
            Role::User,
            "hello".into(),
            String::new(),
        ))
        .await
        .unwrap();
    store
        .append_message(&StoredMessage::now(
            11,
            7,
            Role::Assistant,
            "<model=m>hi".into(),
            "<think time=1>hmm</think>".into(),
        ))
        .await
        .unwrap();

    let history = store.load_history(7).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].reasoning_content, "<think time=1>hmm</think>");

    store.update_conversation_summary(7, "hello").await.unwrap();
    store.rename_conversation(7, "Greetings").await.unwrap();
    assert_eq!(
        store.conversation_title(7).await.unwrap().as_deref(),
        Some("Greetings")
    );

    let listed = store.list_conversations(user.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].summary, "hello");

    store.delete_conversation(7).await.unwrap();
    assert!(store.conversation(7).await.unwrap().is_none());
    assert!(store.load_history(7).await.unwrap().is_empty());
}

#[tokio::test]
async fn debit_is_conditional_on_balance() {
    let (_dir, sqlite) = store().await;
    let user = sqlite.create_user("bob", None, 2).await.unwrap();

    assert_eq!(
        sqlite.debit_credits(user.id, 3, "generation").await.unwrap(),
        DebitOutcome::Insufficient
    );
    assert_eq!(sqlite.user(user.id).await.unwrap().unwrap().points, 2);

    assert_eq!(
        sqlite.debit_credits(user.id, 2, "generation").await.unwrap(),
        DebitOutcome::Debited { balance: 0 }
    );
}
