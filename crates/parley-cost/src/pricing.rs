// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit tariffs.
//!
//! | Tier       | Direct          | Enable-reasoning        |
//! |------------|-----------------|-------------------------|
//! | non-member | `base`          | `⌈base × 1.5⌉`          |
//! | VIP        | `⌈base / 2⌉`    | `⌈⌈base / 2⌉ × 1.5⌉`    |
//! | SVIP       | `0`             | `0`                     |
//!
//! "Enable-reasoning" applies when reasoning is requested and the model has
//! a distinct reasoning variant. Always-reasoning models price as direct.

use chrono::{DateTime, Utc};
use parley_core::types::{ModelEntry, UserAccount};
use parley_core::ParleyError;

use crate::membership::Tier;

/// A priced generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationQuote {
    /// Credits to debit.
    pub cost: i64,
    /// Upstream id to stream from (the reasoning variant when switched).
    pub upstream_model: String,
    /// Whether the reasoning variant was selected.
    pub reasoning_variant: bool,
}

/// Prices a generation of `model` for `user`.
///
/// Fails with [`ParleyError::ModelDoesNotSupportReasoning`] when reasoning
/// is requested for a model without one, and with
/// [`ParleyError::InsufficientCredits`] when the balance does not cover the
/// cost. The balance check here is advisory; the debit itself re-checks
/// atomically.
pub fn quote_generation(
    model: &ModelEntry,
    reasoning: bool,
    user: &UserAccount,
    now: DateTime<Utc>,
) -> Result<GenerationQuote, ParleyError> {
    if reasoning && model.reasoning.is_empty() {
        return Err(ParleyError::ModelDoesNotSupportReasoning(model.name.clone()));
    }

    let reasoning_variant = reasoning && model.has_reasoning_variant();
    let base = model.points.max(0);

    let tier_cost = match Tier::of(user, now) {
        Tier::Svip => 0,
        Tier::Vip => ceil_half(base),
        Tier::NonMember | Tier::Other(_) => base,
    };
    let cost = if reasoning_variant {
        ceil_three_halves(tier_cost)
    } else {
        tier_cost
    };

    if cost > user.points {
        return Err(ParleyError::InsufficientCredits);
    }

    let upstream_model = if reasoning_variant {
        model.reasoning.clone()
    } else {
        model.id.clone()
    };

    Ok(GenerationQuote {
        cost,
        upstream_model,
        reasoning_variant,
    })
}

/// Speech operations with a fixed tariff.
///
/// Only the tariff lives here. No endpoint performs speech synthesis or
/// transcription, so nothing in the server calls [`speech_cost`] yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechKind {
    /// Text-to-speech.
    Tts,
    /// Speech-to-text.
    Stt,
}

/// Prices a speech operation for `user`.
///
/// TTS: non-member 2, VIP 1, SVIP free; other active levels are rejected.
/// STT: non-member 1, any active member free.
pub fn speech_cost(
    kind: SpeechKind,
    user: &UserAccount,
    now: DateTime<Utc>,
) -> Result<i64, ParleyError> {
    let tier = Tier::of(user, now);
    let cost = match (kind, tier) {
        (SpeechKind::Tts, Tier::NonMember) => 2,
        (SpeechKind::Tts, Tier::Vip) => 1,
        (SpeechKind::Tts, Tier::Svip) => 0,
        (SpeechKind::Tts, Tier::Other(level)) => {
            return Err(ParleyError::UnknownMemberLevel(level));
        }
        (SpeechKind::Stt, Tier::NonMember) => 1,
        (SpeechKind::Stt, _) => 0,
    };

    if cost > user.points {
        return Err(ParleyError::InsufficientCredits);
    }
    Ok(cost)
}

fn ceil_half(value: i64) -> i64 {
    (value + 1) / 2
}

fn ceil_three_halves(value: i64) -> i64 {
    (value * 3 + 1) / 2
}
