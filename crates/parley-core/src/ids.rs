// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Snowflake identifiers: 41-bit millisecond timestamp, 10-bit node id,
//! 12-bit per-millisecond sequence.

use std::sync::Mutex;

use chrono::Utc;

use crate::error::ParleyError;

/// 2024-01-01T00:00:00Z in Unix milliseconds.
const EPOCH_MS: i64 = 1_704_067_200_000;
const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_NODE: u16 = (1 << NODE_BITS) - 1;
const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

/// Generates strictly increasing 64-bit ids for a single process.
#[derive(Debug)]
pub struct SnowflakeGenerator {
    node: u16,
    state: Mutex<(i64, u16)>,
}

impl SnowflakeGenerator {
    /// Creates a generator for `node`; values above 1023 are masked.
    pub fn new(node: u16) -> Self {
        Self {
            node: node & MAX_NODE,
            state: Mutex::new((0, 0)),
        }
    }

    /// Returns the next id.
    pub fn next_id(&self) -> Result<i64, ParleyError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ParleyError::Internal("snowflake state poisoned".into()))?;
        let (last_ms, sequence) = *state;

        let mut now = Utc::now().timestamp_millis() - EPOCH_MS;
        if now < last_ms {
            return Err(ParleyError::Internal(format!(
                "clock moved backwards by {}ms",
                last_ms - now
            )));
        }

        let next_sequence = if now == last_ms {
            if sequence == MAX_SEQUENCE {
                while now <= last_ms {
                    std::thread::yield_now();
                    now = Utc::now().timestamp_millis() - EPOCH_MS;
                }
                0
            } else {
                sequence + 1
            }
        } else {
            0
        };

        *state = (now, next_sequence);
        Ok((now << (NODE_BITS + SEQUENCE_BITS))
            | (i64::from(self.node) << SEQUENCE_BITS)
            | i64::from(next_sequence))
    }
}

impl Default for SnowflakeGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let generator = SnowflakeGenerator::new(7);
        let mut previous = 0;
        for _ in 0..10_000 {
            let id = generator.next_id().unwrap();
            assert!(id > previous, "{id} should exceed {previous}");
            previous = id;
        }
    }

    #[test]
    fn node_bits_are_embedded() {
        let generator = SnowflakeGenerator::new(5);
        let id = generator.next_id().unwrap();
        assert_eq!((id >> SEQUENCE_BITS) & i64::from(MAX_NODE), 5);
    }

    #[test]
    fn oversized_node_is_masked() {
        let generator = SnowflakeGenerator::new(u16::MAX);
        assert_eq!(generator.node, MAX_NODE);
    }
}
