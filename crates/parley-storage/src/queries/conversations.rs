// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation CRUD operations.

use parley_core::types::{timestamp_now, Conversation, ConversationId, UserId};
use parley_core::ParleyError;
use rusqlite::{params, OptionalExtension, Row};

use crate::database::{map_tr_err, Database};

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        summary: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub async fn create_conversation(
    db: &Database,
    conversation: &Conversation,
) -> Result<(), ParleyError> {
    let c = conversation.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations (id, user_id, title, summary, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![c.id, c.user_id, c.title, c.summary, c.created_at, c.updated_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_conversation(
    db: &Database,
    conversation_id: ConversationId,
) -> Result<Option<Conversation>, ParleyError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, user_id, title, summary, created_at, updated_at
                 FROM conversations WHERE id = ?1",
                params![conversation_id],
                conversation_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// A user's conversations, most recently updated first.
pub async fn list_conversations(
    db: &Database,
    user_id: UserId,
) -> Result<Vec<Conversation>, ParleyError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, summary, created_at, updated_at
                 FROM conversations WHERE user_id = ?1
                 ORDER BY updated_at DESC, id DESC",
            )?;
            let rows = stmt.query_map(params![user_id], conversation_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a conversation; its messages go with it through the foreign key.
pub async fn delete_conversation(
    db: &Database,
    conversation_id: ConversationId,
) -> Result<(), ParleyError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM conversations WHERE id = ?1",
                params![conversation_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_title(
    db: &Database,
    conversation_id: ConversationId,
) -> Result<Option<String>, ParleyError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT title FROM conversations WHERE id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn rename(
    db: &Database,
    conversation_id: ConversationId,
    title: &str,
) -> Result<(), ParleyError> {
    update_column(db, conversation_id, "title", title).await
}

pub async fn update_summary(
    db: &Database,
    conversation_id: ConversationId,
    summary: &str,
) -> Result<(), ParleyError> {
    update_column(db, conversation_id, "summary", summary).await
}

async fn update_column(
    db: &Database,
    conversation_id: ConversationId,
    column: &'static str,
    value: &str,
) -> Result<(), ParleyError> {
    let value = value.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!("UPDATE conversations SET {column} = ?2, updated_at = ?3 WHERE id = ?1"),
                params![conversation_id, value, timestamp_now()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::users::create_user;
    use parley_core::DEFAULT_CONVERSATION_TITLE;

    fn conversation(id: ConversationId, user_id: UserId, updated_at: &str) -> Conversation {
        Conversation {
            id,
            user_id,
            title: DEFAULT_CONVERSATION_TITLE.to_string(),
            summary: String::new(),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: updated_at.to_string(),
        }
    }

    #[tokio::test]
    async fn create_get_rename_summarize() {
        let db = Database::open_in_memory().await.unwrap();
        let user = create_user(&db, "alice", None, 0).await.unwrap();
        create_conversation(&db, &conversation(11, user.id, "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();

        assert_eq!(
            get_title(&db, 11).await.unwrap().as_deref(),
            Some(DEFAULT_CONVERSATION_TITLE)
        );

        rename(&db, 11, "Trip planning").await.unwrap();
        update_summary(&db, 11, "Where to go in May").await.unwrap();

        let stored = get_conversation(&db, 11).await.unwrap().unwrap();
        assert_eq!(stored.title, "Trip planning");
        assert_eq!(stored.summary, "Where to go in May");
        assert_ne!(stored.updated_at, "2026-01-01T00:00:00.000Z");
    }

    #[tokio::test]
    async fn list_is_newest_first_and_scoped_to_owner() {
        let db = Database::open_in_memory().await.unwrap();
        let alice = create_user(&db, "alice", None, 0).await.unwrap();
        let bob = create_user(&db, "bob", None, 0).await.unwrap();

        create_conversation(&db, &conversation(1, alice.id, "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        create_conversation(&db, &conversation(2, alice.id, "2026-02-01T00:00:00.000Z"))
            .await
            .unwrap();
        create_conversation(&db, &conversation(3, bob.id, "2026-03-01T00:00:00.000Z"))
            .await
            .unwrap();

        let ids: Vec<_> = list_conversations(&db, alice.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn missing_conversation_reads_as_none() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(get_conversation(&db, 5).await.unwrap().is_none());
        assert!(get_title(&db, 5).await.unwrap().is_none());
        delete_conversation(&db, 5).await.unwrap();
    }
}
