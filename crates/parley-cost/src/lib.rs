// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit pricing for the Parley chat backend.
//!
//! This crate provides:
//! - **Membership**: resolution of a user's active tier at a point in time
//! - **Pricing**: the generation tariff and the fixed speech tariff
//! - **Charging**: the debit call against the persistence port

pub mod membership;
pub mod pricing;

use parley_core::types::{DebitOutcome, UserId};
use parley_core::{ChatStore, ParleyError};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, info};

pub use membership::{MemberLevel, Tier};
pub use pricing::{quote_generation, speech_cost, GenerationQuote, SpeechKind};

/// What a debit pays for. Recorded in the credit ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum ChargeReason {
    /// A chat generation.
    Generation,
    /// Text-to-speech synthesis. Priced by [`speech_cost`]; no server
    /// path charges it.
    Tts,
    /// Speech-to-text transcription.
    Stt,
}

/// Debits `amount` credits from `user_id`, failing with
/// [`ParleyError::InsufficientCredits`] when the balance would go negative.
///
/// Zero-cost charges never touch the store.
pub async fn charge(
    store: &dyn ChatStore,
    user_id: UserId,
    amount: i64,
    reason: ChargeReason,
) -> Result<(), ParleyError> {
    if amount == 0 {
        debug!(user_id, %reason, "free charge, skipping debit");
        return Ok(());
    }

    match store
        .debit_credits(user_id, amount, &reason.to_string())
        .await?
    {
        DebitOutcome::Debited { balance } => {
            info!(user_id, amount, balance, %reason, "credits debited");
            Ok(())
        }
        DebitOutcome::Insufficient => {
            info!(user_id, amount, %reason, "debit rejected: insufficient credits");
            Err(ParleyError::InsufficientCredits)
        }
    }
}
