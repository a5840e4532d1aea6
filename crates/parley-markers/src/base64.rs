// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `<base64>…</base64>` marker attaching an encoded image to a user turn.
//!
//! The payload is stored as received from the client, typically a complete
//! `data:image/...;base64,` URL.

use std::sync::LazyLock;

use regex::Regex;

static BASE64_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<base64>(.*?)</base64>").unwrap());

/// User content split into its image payload and prompt text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageAttachment {
    /// Image payload, empty when no image is attached.
    pub payload: String,
    /// Text outside the marker.
    pub remainder: String,
}

/// Prefixes `prompt` with an image marker.
pub fn encode(payload: &str, prompt: &str) -> String {
    format!("<base64>{payload}</base64>{prompt}")
}

/// Extracts the first image marker from `input`.
pub fn decode(input: &str) -> ImageAttachment {
    match BASE64_PATTERN.captures(input) {
        Some(captures) => {
            let whole = captures.get(0).map_or(0..0, |m| m.range());
            let mut remainder = String::with_capacity(input.len() - whole.len());
            remainder.push_str(&input[..whole.start]);
            remainder.push_str(&input[whole.end..]);
            ImageAttachment {
                payload: captures[1].to_string(),
                remainder,
            }
        }
        None => ImageAttachment {
            payload: String::new(),
            remainder: input.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_image_from_prompt() {
        let stored = encode("data:image/png;base64,iVBORw0KGgo=", "what is this?");
        let attachment = decode(&stored);
        assert_eq!(attachment.payload, "data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(attachment.remainder, "what is this?");
    }

    #[test]
    fn prompt_may_contain_newlines() {
        let attachment = decode("<base64>abc</base64>line 1\nline 2");
        assert_eq!(attachment.payload, "abc");
        assert_eq!(attachment.remainder, "line 1\nline 2");
    }

    #[test]
    fn plain_prompt_is_absent() {
        let attachment = decode("no image here");
        assert_eq!(attachment.payload, "");
        assert_eq!(attachment.remainder, "no image here");
    }

    #[test]
    fn unterminated_marker_is_absent() {
        let input = "<base64>abc and more";
        let attachment = decode(input);
        assert_eq!(attachment.payload, "");
        assert_eq!(attachment.remainder, input);
    }
}
