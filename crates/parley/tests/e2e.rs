// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests of the HTTP surface over a real engine and store.
//!
//! Each test creates an isolated TestHarness with temp SQLite and scripted
//! LLM clients. Tests are independent and order-insensitive.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use parley_core::{ChatStore, SnowflakeGenerator};
use parley_gateway::{build_router, GatewayState};
use parley_test_utils::{MockStep, TestHarness, TEST_API_TOKEN};
use serde_json::{json, Value};
use tower::ServiceExt;

fn router(h: &TestHarness) -> Router {
    build_router(GatewayState::new(
        Arc::clone(&h.engine),
        Arc::clone(&h.store) as Arc<dyn ChatStore>,
        Arc::new(SnowflakeGenerator::new(3)),
    ))
}

async fn post(app: &Router, uri: &str, body: Value) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TEST_API_TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn json_body(response: Response) -> Value {
    serde_json::from_str(&text(response).await).unwrap()
}

fn generate(h: &TestHarness, model: &str, prompt: &str) -> Value {
    json!({
        "conversationID": h.conversation_id,
        "messageUserID": h.next_id(),
        "messageAssistantID": h.next_id(),
        "prompt": prompt,
        "model": model,
        "base64": "",
        "reasoning": false,
    })
}

// ---- Reconnect replay ----

#[tokio::test]
async fn second_request_replays_and_follows_the_running_generation() {
    let h = TestHarness::builder().build().await.unwrap();
    h.llm
        .add_script(vec![
            MockStep::content("one "),
            MockStep::Pause,
            MockStep::content("two"),
        ])
        .await;
    let app = router(&h);

    let first = post(&app, "/chat/generate", generate(&h, "Chat", "count")).await;
    assert_eq!(first.status(), StatusCode::OK);
    for _ in 0..200 {
        let emitted = h
            .engine
            .registry()
            .get(h.conversation_id)
            .map(|entry| entry.buffered().len())
            .unwrap_or_default();
        if emitted > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let second = post(&app, "/chat/generate", generate(&h, "Chat", "count")).await;
    assert_eq!(second.status(), StatusCode::OK);
    h.llm.release();

    let (a, b) = tokio::join!(text(first), text(second));
    let expected = "data:{\"success\":true,\"content\":\"one \"}\n\n\
                    data:{\"success\":true,\"content\":\"two\"}\n\n";
    assert_eq!(a, expected);
    assert_eq!(b, expected);

    // Both requests were debited; only one stream was opened upstream.
    assert_eq!(h.points().await.unwrap(), 94);
    assert_eq!(h.llm.streams_opened(), 1);
}

// ---- First completion names the conversation ----

#[tokio::test]
async fn completed_generation_updates_title_and_summary() {
    let h = TestHarness::builder().build().await.unwrap();
    h.secondary.add_completion("Weekend plans").await;
    let app = router(&h);

    text(post(&app, "/chat/generate", generate(&h, "Chat", "plan my weekend")).await).await;
    h.settle().await;

    let listed = json_body(post(&app, "/chat/conversations_list", json!({})).await).await;
    let conversation = &listed["conversations"][0];
    assert_eq!(conversation["id"], h.conversation_id.to_string());
    assert_eq!(conversation["title"], "Weekend plans");
    assert_eq!(conversation["summary"], "plan my weekend");
}

// ---- Images round-trip through history ----

#[tokio::test]
async fn image_prompt_is_stored_with_marker_and_listed_decoded() {
    let h = TestHarness::builder().build().await.unwrap();
    let app = router(&h);
    let image = "data:image/png;base64,iVBORw0KGgo=";

    let mut body = generate(&h, "Vision", "what is in this picture?");
    body["base64"] = json!(image);
    text(post(&app, "/chat/generate", body).await).await;
    h.settle().await;

    let stored = h.history().await.unwrap();
    assert!(stored[0].content.starts_with("<base64>"));

    let listed = json_body(
        post(
            &app,
            "/chat/messages_list",
            json!({"conversationID": h.conversation_id}),
        )
        .await,
    )
    .await;
    let user = &listed["messages"][0];
    assert_eq!(user["base64"], image);
    assert_eq!(user["content"], "what is in this picture?");
    let assistant = &listed["messages"][1];
    assert_eq!(assistant["model"], "vision-1");
    assert_eq!(assistant["content"], "mock response");
}

// ---- Health reflects running generations ----

#[tokio::test]
async fn health_counts_active_generations() {
    let h = TestHarness::builder().build().await.unwrap();
    h.llm.add_script(vec![MockStep::Pause]).await;
    let app = router(&h);

    let stream = post(&app, "/chat/generate", generate(&h, "Chat", "wait")).await;
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let health = json_body(app.clone().oneshot(request).await.unwrap()).await;
    assert_eq!(health["active_generations"], 1);

    let stopped = post(
        &app,
        "/chat/stop",
        json!({"conversationID": h.conversation_id}),
    )
    .await;
    assert_eq!(stopped.status(), StatusCode::OK);
    text(stream).await;
    h.settle().await;
    assert_eq!(h.engine.active_generations(), 0);
}
