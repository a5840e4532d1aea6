// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User account queries.

use chrono::{DateTime, Utc};
use parley_core::types::{UserAccount, UserId};
use parley_core::ParleyError;
use rusqlite::{params, OptionalExtension, Row};

use crate::database::{map_tr_err, Database};

const USER_COLUMNS: &str = "id, username, points, is_member, member_level, member_until";

fn parse_until(value: Option<String>, column: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        column,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
        })
        .transpose()
}

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserAccount> {
    Ok(UserAccount {
        id: row.get(0)?,
        username: row.get(1)?,
        points: row.get(2)?,
        is_member: row.get(3)?,
        member_level: row.get(4)?,
        member_until: parse_until(row.get(5)?, 5)?,
    })
}

/// Insert a user and return the stored row.
pub async fn create_user(
    db: &Database,
    username: &str,
    api_token: Option<&str>,
    points: i64,
) -> Result<UserAccount, ParleyError> {
    let username = username.to_string();
    let api_token = api_token.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (username, api_token, points) VALUES (?1, ?2, ?3)",
                params![username, api_token, points],
            )?;
            let id = conn.last_insert_rowid();
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_user(db: &Database, user_id: UserId) -> Result<Option<UserAccount>, ParleyError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![user_id],
                user_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_user_by_token(
    db: &Database,
    token: &str,
) -> Result<Option<UserAccount>, ParleyError> {
    let token = token.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE api_token = ?1"),
                params![token],
                user_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Set or clear a membership. `until = None` ends it.
pub async fn set_membership(
    db: &Database,
    user_id: UserId,
    level: &str,
    until: Option<DateTime<Utc>>,
) -> Result<(), ParleyError> {
    let level = level.to_string();
    let until = until.map(|dt| dt.to_rfc3339());
    let is_member = until.is_some();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE users SET is_member = ?2, member_level = ?3, member_until = ?4
                 WHERE id = ?1",
                params![user_id, is_member, level, until],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
