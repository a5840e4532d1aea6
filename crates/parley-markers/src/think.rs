// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `<think time=N>…</think>` marker carrying reasoning text and its elapsed seconds.

use std::sync::LazyLock;

use regex::Regex;

static THINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think time=(\d+)>(.*?)</think>").unwrap());

/// A decoded think marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThinkBlock {
    /// Seconds between stream open and the last reasoning delta.
    pub elapsed_seconds: u64,
    /// Reasoning text inside the marker.
    pub payload: String,
    /// Input with every think marker removed.
    pub remainder: String,
}

/// Wraps `payload` in a think marker.
pub fn encode(elapsed_seconds: u64, payload: &str) -> String {
    format!("<think time={elapsed_seconds}>{payload}</think>")
}

/// Extracts the first think marker from `input`.
pub fn decode(input: &str) -> ThinkBlock {
    let Some(captures) = THINK_PATTERN.captures(input) else {
        return absent(input);
    };
    let Ok(elapsed_seconds) = captures[1].parse::<u64>() else {
        return absent(input);
    };

    ThinkBlock {
        elapsed_seconds,
        payload: captures[2].to_string(),
        remainder: THINK_PATTERN.replace_all(input, "").into_owned(),
    }
}

fn absent(input: &str) -> ThinkBlock {
    ThinkBlock {
        elapsed_seconds: 0,
        payload: String::new(),
        remainder: input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_marker_with_surrounding_text() {
        let block = decode("before<think time=7>pondering</think>after");
        assert_eq!(block.elapsed_seconds, 7);
        assert_eq!(block.payload, "pondering");
        assert_eq!(block.remainder, "beforeafter");
    }

    #[test]
    fn payload_may_span_lines() {
        let block = decode("<think time=3>line one\nline two</think>");
        assert_eq!(block.payload, "line one\nline two");
        assert_eq!(block.remainder, "");
    }

    #[test]
    fn missing_marker_is_absent() {
        let block = decode("plain reasoning");
        assert_eq!(block, absent("plain reasoning"));
        assert_eq!(decode(""), absent(""));
    }

    #[test]
    fn unterminated_or_malformed_markers_are_absent() {
        for input in [
            "<think time=4>no close",
            "<think time=>x</think>",
            "<think time=abc>x</think>",
            "<think>x</think>",
            "<think time=99999999999999999999999>x</think>",
        ] {
            let block = decode(input);
            assert_eq!(block.elapsed_seconds, 0, "{input}");
            assert_eq!(block.payload, "", "{input}");
            assert_eq!(block.remainder, input);
        }
    }

    #[test]
    fn first_marker_wins_and_all_are_removed() {
        let block = decode("<think time=1>a</think><think time=2>b</think>tail");
        assert_eq!(block.elapsed_seconds, 1);
        assert_eq!(block.payload, "a");
        assert_eq!(block.remainder, "tail");
    }

    proptest! {
        #[test]
        fn encoded_blocks_decode_to_their_parts(
            elapsed in any::<u64>(),
            payload in any::<String>().prop_filter("no closing tag", |p| !p.contains("</think>")),
        ) {
            let block = decode(&encode(elapsed, &payload));
            prop_assert_eq!(block.elapsed_seconds, elapsed);
            prop_assert_eq!(block.payload, payload);
            prop_assert_eq!(block.remainder, "");
        }

        #[test]
        fn decode_never_panics(input in any::<String>()) {
            let _ = decode(&input);
        }
    }
}
