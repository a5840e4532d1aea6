// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming response parser.
//!
//! Each SSE `data:` line holds a [`ChatCompletionChunk`]; the literal
//! `[DONE]` ends the stream.

use futures::future;
use futures::stream::StreamExt;
use eventsource_stream::Eventsource;
use parley_core::types::StreamDelta;
use parley_core::{DeltaStream, ParleyError};

use crate::types::{ApiErrorResponse, ChatCompletionChunk};

const DONE_SENTINEL: &str = "[DONE]";

enum Frame {
    Delta(StreamDelta),
    Skip,
    Done,
    Failed(ParleyError),
}

/// Turn a successful streaming response into a [`DeltaStream`].
///
/// Frames without content or reasoning (role announcements, finish markers)
/// are dropped. An error object in place of a chunk, or a transport error,
/// yields one `Err` item and ends the stream.
pub fn parse_sse_stream(response: reqwest::Response) -> DeltaStream {
    let frames = response.bytes_stream().eventsource().map(|result| match result {
        Ok(event) => parse_data(&event.data),
        Err(e) => Frame::Failed(ParleyError::Provider {
            message: format!("SSE stream error: {e}"),
            source: None,
        }),
    });

    let mut failed = false;
    let deltas = frames
        .take_while(move |frame| {
            let keep = !failed && !matches!(frame, Frame::Done);
            failed |= matches!(frame, Frame::Failed(_));
            future::ready(keep)
        })
        .filter_map(|frame| {
            future::ready(match frame {
                Frame::Delta(delta) => Some(Ok(delta)),
                Frame::Failed(err) => Some(Err(err)),
                Frame::Skip | Frame::Done => None,
            })
        });

    Box::pin(deltas)
}

fn parse_data(data: &str) -> Frame {
    let data = data.trim();
    if data == DONE_SENTINEL {
        return Frame::Done;
    }
    if data.is_empty() {
        return Frame::Skip;
    }

    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => {
            let Some(choice) = chunk.choices.into_iter().next() else {
                return Frame::Skip;
            };
            let content = choice.delta.content.filter(|s| !s.is_empty());
            let reasoning = choice.delta.reasoning_content.filter(|s| !s.is_empty());
            if content.is_none() && reasoning.is_none() {
                Frame::Skip
            } else {
                Frame::Delta(StreamDelta { content, reasoning })
            }
        }
        Err(parse_err) => match serde_json::from_str::<ApiErrorResponse>(data) {
            Ok(api_err) => Frame::Failed(ParleyError::Provider {
                message: api_err.error.message,
                source: None,
            }),
            Err(_) => Frame::Failed(ParleyError::Provider {
                message: format!("failed to parse stream chunk: {parse_err}"),
                source: Some(Box::new(parse_err)),
            }),
        },
    }
}
