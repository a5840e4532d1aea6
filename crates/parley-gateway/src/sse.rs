// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events framing for POST /chat/generate.
//!
//! Every generation event becomes one frame:
//! ```text
//! data:{"success":true,"content":"Hel"}
//!
//! data:{"success":true,"reasoningContent":"let me think","reasoningTime":2}
//!
//! ```
//!
//! The body ends when the generation terminates. A client that disconnects
//! only drops its subscription; the generation keeps running and a repeated
//! request for the same conversation replays what was emitted so far.

use std::convert::Infallible;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures::stream::{Stream, StreamExt};
use parley_core::types::GenerationEvent;
use parley_engine::Subscription;
use parley_markers::think;
use serde::Serialize;

/// Client-facing shape of a generation event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Incremental reasoning text as the upstream sent it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl From<GenerationEvent> for WireEvent {
    fn from(event: GenerationEvent) -> Self {
        let (reasoning_content, reasoning_time) = match event.reasoning_delta {
            Some(_) if event.reasoning_text.is_some() => {
                (event.reasoning_text, event.reasoning_elapsed_seconds)
            }
            Some(marker) => {
                let block = think::decode(&marker);
                (
                    Some(block.payload),
                    event
                        .reasoning_elapsed_seconds
                        .or(Some(block.elapsed_seconds)),
                )
            }
            None => (None, None),
        };
        WireEvent {
            success: event.success,
            error: event.error,
            reasoning_content,
            reasoning_time,
            content: event.content_delta,
        }
    }
}

/// Serializes one event as a `data:` frame.
pub fn frame(event: &WireEvent) -> String {
    match serde_json::to_string(event) {
        Ok(json) => format!("data:{json}\n\n"),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize wire event");
            "data:{\"success\":false,\"error\":\"internal error\"}\n\n".to_string()
        }
    }
}

/// Frames a subscription until its generation terminates.
pub fn event_stream(
    subscription: Subscription,
) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static {
    subscription
        .into_stream()
        .map(|event| Ok(frame(&WireEvent::from(event))))
}

/// Streaming response with the event-stream headers set.
pub fn into_response(subscription: Subscription) -> Response {
    let mut response = (StatusCode::OK, Body::from_stream(event_stream(subscription)))
        .into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}
