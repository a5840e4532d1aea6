// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Share links over a list of messages.
//!
//! A share id is 16 lowercase hex characters drawn from the OS-seeded RNG.
//! Links older than [`SHARE_TTL_DAYS`] are purged whenever a link is
//! created or read.

use chrono::{Duration, Utc};
use parley_core::types::{timestamp_now, MessageId, StoredMessage, UserId};
use parley_core::ParleyError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::queries::messages::{message_from_row, MESSAGE_COLUMNS};

/// Days a share link stays readable.
pub const SHARE_TTL_DAYS: i64 = 7;

/// Collisions are astronomically unlikely; this only bounds the loop.
const MAX_ID_ATTEMPTS: usize = 8;

fn new_share_id() -> String {
    hex::encode(rand::random::<[u8; 8]>())
}

fn expiry_cutoff() -> String {
    (Utc::now() - Duration::days(SHARE_TTL_DAYS))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

fn purge_expired(conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM shares WHERE created_at < ?1",
        params![expiry_cutoff()],
    )
}

/// Record a share of `message_ids` (in that order) and return its id.
pub async fn create_share(
    db: &Database,
    user_id: UserId,
    message_ids: &[MessageId],
) -> Result<String, ParleyError> {
    let message_ids = message_ids.to_vec();
    let created = db
        .connection()
        .call(move |conn| {
            purge_expired(conn)?;
            let tx = conn.transaction()?;
            let now = timestamp_now();
            let mut share_id = None;
            for _ in 0..MAX_ID_ATTEMPTS {
                let candidate = new_share_id();
                let inserted = tx.execute(
                    "INSERT INTO shares (share_id, user_id, created_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(share_id) DO NOTHING",
                    params![candidate, user_id, now],
                )?;
                if inserted == 1 {
                    share_id = Some(candidate);
                    break;
                }
            }
            let Some(share_id) = share_id else {
                return Ok(None);
            };
            for (position, message_id) in message_ids.iter().enumerate() {
                tx.execute(
                    "INSERT INTO share_messages (share_id, position, message_id)
                     VALUES (?1, ?2, ?3)",
                    params![share_id, position as i64, message_id],
                )?;
            }
            tx.commit()?;
            Ok(Some(share_id))
        })
        .await
        .map_err(map_tr_err)?;
    created.ok_or_else(|| ParleyError::Internal("could not allocate a share id".into()))
}

/// Messages of a live share in shared order, or `None` for an unknown or
/// expired link. Messages deleted since sharing are left out.
pub async fn shared_messages(
    db: &Database,
    share_id: &str,
) -> Result<Option<Vec<StoredMessage>>, ParleyError> {
    let share_id = share_id.to_string();
    db.connection()
        .call(move |conn| {
            purge_expired(conn)?;
            let exists = conn
                .query_row(
                    "SELECT 1 FROM shares WHERE share_id = ?1",
                    params![share_id],
                    |_| Ok(()),
                )
                .optional()?;
            if exists.is_none() {
                return Ok(None);
            }
            let columns = MESSAGE_COLUMNS
                .split(", ")
                .map(|c| format!("m.{c}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT {columns} FROM share_messages s
                 JOIN messages m ON m.id = s.message_id
                 WHERE s.share_id = ?1 ORDER BY s.position ASC"
            ))?;
            let rows = stmt.query_map(params![share_id], message_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map(Some)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::conversations::create_conversation;
    use crate::queries::messages::{append_message, delete_message};
    use crate::queries::users::create_user;
    use parley_core::types::{Conversation, Role};

    async fn seeded() -> (Database, UserId) {
        let db = Database::open_in_memory().await.unwrap();
        let user = create_user(&db, "alice", None, 0).await.unwrap();
        create_conversation(
            &db,
            &Conversation {
                id: 1,
                user_id: user.id,
                title: "t".into(),
                summary: String::new(),
                created_at: "2026-01-01T00:00:00.000Z".into(),
                updated_at: "2026-01-01T00:00:00.000Z".into(),
            },
        )
        .await
        .unwrap();
        for (id, role, content) in [
            (10, Role::User, "question"),
            (11, Role::Assistant, "answer"),
            (12, Role::User, "follow-up"),
        ] {
            append_message(
                &db,
                &StoredMessage {
                    id,
                    conversation_id: 1,
                    role,
                    content: content.into(),
                    reasoning_content: String::new(),
                    created_at: format!("2026-01-01T00:00:{id}.000Z"),
                },
            )
            .await
            .unwrap();
        }
        (db, user.id)
    }

    #[test]
    fn share_ids_are_sixteen_hex_chars() {
        let id = new_share_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn share_keeps_requested_order() {
        let (db, user_id) = seeded().await;
        let share_id = create_share(&db, user_id, &[12, 10]).await.unwrap();

        let messages = shared_messages(&db, &share_id).await.unwrap().unwrap();
        let ids: Vec<_> = messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![12, 10]);
    }

    #[tokio::test]
    async fn deleted_message_drops_out_of_share() {
        let (db, user_id) = seeded().await;
        let share_id = create_share(&db, user_id, &[10, 11]).await.unwrap();
        delete_message(&db, 11).await.unwrap();

        let messages = shared_messages(&db, &share_id).await.unwrap().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "question");
    }

    #[tokio::test]
    async fn unknown_and_expired_shares_read_as_none() {
        let (db, user_id) = seeded().await;
        assert!(shared_messages(&db, "0000000000000000").await.unwrap().is_none());

        let share_id = create_share(&db, user_id, &[10]).await.unwrap();
        let stale = share_id.clone();
        db.connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE shares SET created_at = '2000-01-01T00:00:00.000Z' WHERE share_id = ?1",
                    params![stale],
                )
            })
            .await
            .unwrap();

        assert!(shared_messages(&db, &share_id).await.unwrap().is_none());
        let left: i64 = db
            .connection()
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM share_messages", [], |r| r.get(0)))
            .await
            .unwrap();
        assert_eq!(left, 0);
    }
}
