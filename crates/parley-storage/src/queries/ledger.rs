// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit debits and the ledger that records them.

use parley_core::types::{timestamp_now, DebitOutcome, UserId};
use parley_core::ParleyError;
use rusqlite::params;

use crate::database::{map_tr_err, Database};

/// One row of the credit ledger. Debits carry a negative `amount`.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub user_id: UserId,
    pub amount: i64,
    pub reason: String,
    pub balance_after: i64,
    pub created_at: String,
}

/// Subtract `amount` from the balance if it covers it.
///
/// The balance test and the subtraction are one `UPDATE`, so concurrent
/// debits can never drive `points` below zero. An unknown user reads as
/// insufficient.
pub async fn debit(
    db: &Database,
    user_id: UserId,
    amount: i64,
    reason: &str,
) -> Result<DebitOutcome, ParleyError> {
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE users SET points = points - ?2 WHERE id = ?1 AND points >= ?2",
                params![user_id, amount],
            )?;
            if changed == 0 {
                return Ok(DebitOutcome::Insufficient);
            }
            let balance: i64 = tx.query_row(
                "SELECT points FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO credit_ledger (user_id, amount, reason, balance_after, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user_id, -amount, reason, balance, timestamp_now()],
            )?;
            tx.commit()?;
            Ok(DebitOutcome::Debited { balance })
        })
        .await
        .map_err(map_tr_err)
}

/// Ledger rows for a user, oldest first.
#[cfg(any(test, feature = "test-support"))]
pub async fn entries_for_user(
    db: &Database,
    user_id: UserId,
) -> Result<Vec<LedgerEntry>, ParleyError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, amount, reason, balance_after, created_at
                 FROM credit_ledger WHERE user_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok(LedgerEntry {
                    user_id: row.get(0)?,
                    amount: row.get(1)?,
                    reason: row.get(2)?,
                    balance_after: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
