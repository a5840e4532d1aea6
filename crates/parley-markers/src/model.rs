// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `<model=ID>` prefix recording which upstream model produced a reply.

use std::sync::LazyLock;

use regex::Regex;

static MODEL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A<model=([^>]+)>").unwrap());

/// Assistant content split into its model tag and the reply text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelTagged {
    /// Upstream model id, empty when the content carries no tag.
    pub model: String,
    pub content: String,
}

/// Prefixes `content` with a model tag.
pub fn encode(model: &str, content: &str) -> String {
    format!("<model={model}>{content}")
}

/// Splits a leading model tag off `input`.
pub fn decode(input: &str) -> ModelTagged {
    match MODEL_PATTERN.captures(input) {
        Some(captures) => {
            let tag_len = captures[0].len();
            ModelTagged {
                model: captures[1].to_string(),
                content: input[tag_len..].to_string(),
            }
        }
        None => ModelTagged {
            model: String::new(),
            content: input.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_tag_from_reply() {
        let tagged = decode("<model=gpt-4o-mini>Hello <b>there</b>");
        assert_eq!(tagged.model, "gpt-4o-mini");
        assert_eq!(tagged.content, "Hello <b>there</b>");
    }

    #[test]
    fn tag_must_be_a_prefix() {
        let input = "reply <model=gpt-4o> later";
        assert_eq!(
            decode(input),
            ModelTagged {
                model: String::new(),
                content: input.to_string()
            }
        );
    }

    #[test]
    fn empty_or_unterminated_tags_are_absent() {
        for input in ["", "<model=>x", "<model=abc", "<model abc>x"] {
            let tagged = decode(input);
            assert_eq!(tagged.model, "", "{input}");
            assert_eq!(tagged.content, input);
        }
    }

    #[test]
    fn encode_then_decode_restores_reply() {
        let stored = encode("deepseek-r1", "answer: 42");
        assert_eq!(stored, "<model=deepseek-r1>answer: 42");
        let tagged = decode(&stored);
        assert_eq!(tagged.model, "deepseek-r1");
        assert_eq!(tagged.content, "answer: 42");
    }
}
