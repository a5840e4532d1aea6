// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message history operations.

use parley_core::types::{ConversationId, MessageId, Role, StoredMessage};
use parley_core::ParleyError;
use rusqlite::{params, OptionalExtension, Row};

use crate::database::{map_tr_err, Database};

pub(crate) const MESSAGE_COLUMNS: &str =
    "id, conversation_id, role, content, reasoning_content, created_at";

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<StoredMessage> {
    let role: String = row.get(2)?;
    let role = role.parse::<Role>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(StoredMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role,
        content: row.get(3)?,
        reasoning_content: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Append a message to its conversation.
///
/// Message ids are chosen by the client, so a retried request may present
/// an id that already exists. The existing row keeps its position and takes
/// the new content, but only when it belongs to the same conversation; an
/// id owned by another conversation is refused with
/// [`ParleyError::MessageIdConflict`].
pub async fn append_message(db: &Database, message: &StoredMessage) -> Result<(), ParleyError> {
    let msg = message.clone();
    let id = msg.id;
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, role, content, reasoning_content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                     content = excluded.content,
                     reasoning_content = excluded.reasoning_content
                 WHERE messages.conversation_id = excluded.conversation_id",
                params![
                    msg.id,
                    msg.conversation_id,
                    msg.role.to_string(),
                    msg.content,
                    msg.reasoning_content,
                    msg.created_at,
                ],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(ParleyError::MessageIdConflict(id));
    }
    Ok(())
}

/// Messages of a conversation in dialogue order.
pub async fn load_history(
    db: &Database,
    conversation_id: ConversationId,
) -> Result<Vec<StoredMessage>, ParleyError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?1
                 ORDER BY created_at ASC, seq ASC"
            ))?;
            let rows = stmt.query_map(params![conversation_id], message_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_message(
    db: &Database,
    message_id: MessageId,
) -> Result<Option<StoredMessage>, ParleyError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![message_id],
                message_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete one message. Deleting an unknown id is not an error.
pub async fn delete_message(db: &Database, message_id: MessageId) -> Result<(), ParleyError> {
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM messages WHERE id = ?1", params![message_id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
