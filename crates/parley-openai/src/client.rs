// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for an OpenAI-compatible `/chat/completions` endpoint.
//!
//! Handles authentication, request construction, and retry of transient
//! failures before a response body starts.

use std::time::Duration;

use parley_core::{DeltaStream, ParleyError};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, warn};

use crate::sse;
use crate::types::{ApiErrorResponse, ChatCompletionRequest, ChatCompletionResponse};

/// Pause between a transient failure and the next attempt.
const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    max_retries: u32,
}

impl OpenAiClient {
    /// Build a client for `api_base` (e.g. `https://api.openai.com/v1`).
    pub fn new(
        api_key: &str,
        api_base: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, ParleyError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| ParleyError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ParleyError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            max_retries,
        })
    }

    /// Open a streaming completion.
    pub async fn stream_chat(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<DeltaStream, ParleyError> {
        let mut req = request.clone();
        req.stream = true;
        let response = self.send(&req).await?;
        Ok(sse::parse_sse_stream(response))
    }

    /// Send a non-streaming completion and return the parsed body.
    pub async fn complete_chat(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ParleyError> {
        let mut req = request.clone();
        req.stream = false;
        let response = self.send(&req).await?;

        let body = response.text().await.map_err(|e| ParleyError::Provider {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;
        serde_json::from_str(&body).map_err(|e| ParleyError::Provider {
            message: format!("failed to parse API response: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// POST the request, retrying transient statuses, and return the first
    /// successful response.
    async fn send(&self, req: &ChatCompletionRequest) -> Result<reqwest::Response, ParleyError> {
        let mut attempt = 0;
        loop {
            let response = self
                .client
                .post(&self.endpoint)
                .json(req)
                .send()
                .await
                .map_err(|e| ParleyError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, model = %req.model, stream = req.stream, "upstream responded");

            if status.is_success() {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "transient upstream error, will retry");
                attempt += 1;
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }

            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => match api_err.error.type_ {
                    Some(kind) => format!("upstream error ({kind}): {}", api_err.error.message),
                    None => format!("upstream error: {}", api_err.error.message),
                },
                Err(_) => format!("API returned {status}: {body}"),
            };
            return Err(ParleyError::Provider {
                message,
                source: None,
            });
        }
    }
}

fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{WireContent, WireMessage};
    use futures::StreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new("sk-test", &format!("{}/v1/", server.uri()), Duration::from_secs(5), 1)
            .unwrap()
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "gpt-test".into(),
            messages: vec![WireMessage {
                role: "user".into(),
                content: WireContent::Text("Hello".into()),
                reasoning_content: None,
            }],
            stream: false,
        }
    }

    fn completion(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "model": "gpt-test",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}]
        })
    }

    #[tokio::test]
    async fn complete_sends_auth_and_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-test", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hi!")))
            .expect(1)
            .mount(&server)
            .await;

        let reply = test_client(&server).complete_chat(&request()).await.unwrap();
        assert_eq!(reply.choices[0].message.content.as_deref(), Some("Hi!"));
        assert_eq!(reply.model, "gpt-test");
    }

    #[tokio::test]
    async fn retries_once_on_429() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("after retry")))
            .mount(&server)
            .await;

        let reply = test_client(&server).complete_chat(&request()).await.unwrap();
        assert_eq!(reply.choices[0].message.content.as_deref(), Some("after retry"));
    }

    #[tokio::test]
    async fn gives_up_after_retries_on_503() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": {"message": "overloaded", "type": "server_error"}
            })))
            .expect(2)
            .mount(&server)
            .await;

        let err = test_client(&server).complete_chat(&request()).await.unwrap_err();
        assert!(err.to_string().contains("overloaded"), "got: {err}");
    }

    #[tokio::test]
    async fn does_not_retry_400() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "bad model", "type": "invalid_request_error"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server).complete_chat(&request()).await.unwrap_err();
        assert!(err.to_string().contains("invalid_request_error"), "got: {err}");
    }

    #[tokio::test]
    async fn stream_requests_streaming_and_yields_deltas() {
        let server = MockServer::start().await;
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let stream = test_client(&server).stream_chat(&request()).await.unwrap();
        let text: String = stream
            .map(|d| d.unwrap().content.unwrap_or_default())
            .collect::<Vec<_>>()
            .await
            .concat();
        assert_eq!(text, "ab");
    }
}
