// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the chat API.
//!
//! Handles POST /chat/generate, /chat/stop, /chat/thread_list, the
//! conversation and message endpoints, plus the public GET /health and
//! GET /chat/{share_id}.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use parley_core::types::{
    timestamp_now, Conversation, ConversationId, MessageId, Role, StoredMessage, UserAccount,
    DEFAULT_CONVERSATION_TITLE,
};
use parley_core::ParleyError;
use parley_engine::GenerateRequest;
use parley_markers::{base64, model, think};
use serde::{Deserialize, Serialize};

use crate::server::GatewayState;
use crate::sse;

/// Request body for POST /chat/generate.
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    #[serde(rename = "conversationID")]
    pub conversation_id: ConversationId,
    #[serde(rename = "messageUserID")]
    pub message_user_id: MessageId,
    #[serde(rename = "messageAssistantID")]
    pub message_assistant_id: MessageId,
    #[serde(default)]
    pub prompt: String,
    pub model: String,
    /// Attached image payload; empty for none.
    #[serde(default)]
    pub base64: String,
    #[serde(default)]
    pub reasoning: bool,
}

/// Request body naming a single conversation.
#[derive(Debug, Deserialize)]
pub struct ConversationBody {
    #[serde(rename = "conversationID")]
    pub conversation_id: ConversationId,
}

/// Request body for POST /chat/share_messages.
#[derive(Debug, Deserialize)]
pub struct ShareBody {
    /// Decimal message ids, as listed by /chat/messages_list.
    #[serde(rename = "messageIDs")]
    pub message_ids: Vec<String>,
}

/// Request body for POST /chat/delete_message.
#[derive(Debug, Deserialize)]
pub struct MessageBody {
    #[serde(rename = "messageID")]
    pub message_id: MessageId,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Response body for POST /chat/thread_list.
#[derive(Debug, Serialize)]
pub struct ThreadListResponse {
    pub success: bool,
    pub thread_list: Vec<ConversationId>,
}

/// Response body for POST /chat/new_conversation.
#[derive(Debug, Serialize)]
pub struct NewConversationResponse {
    pub success: bool,
    /// Decimal string; ids exceed the integer precision of JavaScript clients.
    #[serde(rename = "conversationID")]
    pub conversation_id: String,
}

/// Response body for POST /chat/conversations_list.
#[derive(Debug, Serialize)]
pub struct ConversationsListResponse {
    pub success: bool,
    pub conversations: Vec<ConversationInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationInfo {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub updated_at: String,
}

impl From<Conversation> for ConversationInfo {
    fn from(conversation: Conversation) -> Self {
        Self {
            id: conversation.id.to_string(),
            title: conversation.title,
            summary: conversation.summary,
            updated_at: conversation.updated_at,
        }
    }
}

/// Response body for POST /chat/messages_list.
#[derive(Debug, Serialize)]
pub struct MessagesListResponse {
    pub success: bool,
    pub messages: Vec<MessageView>,
}

/// A stored message with its inline markers decoded into fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Upstream model that produced an assistant reply.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reasoning_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_time: Option<u64>,
    /// Image attached to a user message.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub base64: String,
}

impl From<StoredMessage> for MessageView {
    fn from(message: StoredMessage) -> Self {
        let mut view = MessageView {
            id: message.id.to_string(),
            role: message.role,
            content: String::new(),
            model: String::new(),
            reasoning_content: String::new(),
            reasoning_time: None,
            base64: String::new(),
        };
        match message.role {
            Role::Assistant => {
                let tagged = model::decode(&message.content);
                view.model = tagged.model;
                view.content = tagged.content;
                if !message.reasoning_content.is_empty() {
                    let block = think::decode(&message.reasoning_content);
                    view.reasoning_content = block.payload;
                    view.reasoning_time = Some(block.elapsed_seconds);
                }
            }
            Role::User => {
                let attachment = base64::decode(&message.content);
                view.base64 = attachment.payload;
                view.content = attachment.remainder;
            }
            Role::System => view.content = message.content,
        }
        view
    }
}

/// Response body for POST /chat/share_messages.
#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub success: bool,
    pub share_id: String,
}

/// Response body for GET /chat/{share_id}.
#[derive(Debug, Serialize)]
pub struct SharedMessagesResponse {
    pub success: bool,
    pub messages: Vec<MessageView>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_generations: usize,
}

fn error_response(e: &ParleyError) -> Response {
    let status =
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(error = %e, "request failed");
    }
    (status, Json(ErrorResponse::new(e.to_string()))).into_response()
}

fn rejected(rejection: JsonRejection) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(rejection.body_text())),
    )
        .into_response()
}

/// Loads a conversation and checks that `user` owns it.
async fn owned_conversation(
    state: &GatewayState,
    user: &UserAccount,
    conversation_id: ConversationId,
) -> Result<Conversation, ParleyError> {
    match state.store.conversation(conversation_id).await? {
        Some(conversation) if conversation.user_id == user.id => Ok(conversation),
        _ => Err(ParleyError::NotFound(format!("conversation {conversation_id}"))),
    }
}

/// POST /chat/generate
///
/// Prices and debits the request, then streams the conversation's
/// generation as SSE. Rejections before the stream starts answer with a
/// JSON error body instead.
pub async fn generate(
    State(state): State<GatewayState>,
    Extension(user): Extension<UserAccount>,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };

    let request = GenerateRequest {
        conversation_id: body.conversation_id,
        user_message_id: body.message_user_id,
        assistant_message_id: body.message_assistant_id,
        prompt: body.prompt,
        model: body.model,
        image: body.base64,
        reasoning: body.reasoning,
    };
    match state.engine.start(&user, request).await {
        Ok(stream) => {
            tracing::debug!(
                conversation_id = body.conversation_id,
                joined = stream.joined,
                "streaming generation"
            );
            sse::into_response(stream.subscription)
        }
        Err(e) => error_response(&e),
    }
}

/// POST /chat/stop
pub async fn stop(
    State(state): State<GatewayState>,
    Extension(user): Extension<UserAccount>,
    body: Result<Json<ConversationBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };

    if !state.engine.stop(user.id, body.conversation_id) {
        return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new("内部错误"))).into_response();
    }
    Json(SuccessResponse { success: true }).into_response()
}

/// POST /chat/thread_list
pub async fn thread_list(
    State(state): State<GatewayState>,
    Extension(user): Extension<UserAccount>,
) -> Json<ThreadListResponse> {
    Json(ThreadListResponse {
        success: true,
        thread_list: state.engine.thread_list(user.id),
    })
}

/// POST /chat/new_conversation
pub async fn new_conversation(
    State(state): State<GatewayState>,
    Extension(user): Extension<UserAccount>,
) -> Response {
    let id = match state.ids.next_id() {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let now = timestamp_now();
    let conversation = Conversation {
        id,
        user_id: user.id,
        title: DEFAULT_CONVERSATION_TITLE.to_string(),
        summary: String::new(),
        created_at: now.clone(),
        updated_at: now,
    };
    if let Err(e) = state.store.create_conversation(&conversation).await {
        return error_response(&e);
    }
    tracing::info!(conversation_id = id, user_id = user.id, "conversation created");

    Json(NewConversationResponse {
        success: true,
        conversation_id: id.to_string(),
    })
    .into_response()
}

/// POST /chat/conversations_list
///
/// Returns the caller's conversations, most recently updated first.
pub async fn conversations_list(
    State(state): State<GatewayState>,
    Extension(user): Extension<UserAccount>,
) -> Response {
    match state.store.list_conversations(user.id).await {
        Ok(conversations) => Json(ConversationsListResponse {
            success: true,
            conversations: conversations.into_iter().map(ConversationInfo::from).collect(),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST /chat/messages_list
///
/// Returns the conversation's messages in dialogue order.
pub async fn messages_list(
    State(state): State<GatewayState>,
    Extension(user): Extension<UserAccount>,
    body: Result<Json<ConversationBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };

    let history = match owned_conversation(&state, &user, body.conversation_id).await {
        Ok(_) => state.store.load_history(body.conversation_id).await,
        Err(e) => Err(e),
    };
    match history {
        Ok(history) => Json(MessagesListResponse {
            success: true,
            messages: history.into_iter().map(MessageView::from).collect(),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST /chat/delete_conversation
///
/// Refuses while the conversation has a running generation.
pub async fn delete_conversation(
    State(state): State<GatewayState>,
    Extension(user): Extension<UserAccount>,
    body: Result<Json<ConversationBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    let conversation_id = body.conversation_id;

    if let Err(e) = owned_conversation(&state, &user, conversation_id).await {
        return error_response(&e);
    }
    if state.engine.is_generating(conversation_id) {
        return generation_in_progress();
    }
    if let Err(e) = state.store.delete_conversation(conversation_id).await {
        return error_response(&e);
    }
    tracing::info!(conversation_id, user_id = user.id, "conversation deleted");
    Json(SuccessResponse { success: true }).into_response()
}

/// Parses decimal message ids, naming the first one that is not.
fn parse_message_ids(raw: &[String]) -> Result<Vec<MessageId>, String> {
    raw.iter()
        .map(|id| {
            id.trim()
                .parse::<MessageId>()
                .map_err(|_| format!("无效的消息ID: {id}"))
        })
        .collect()
}

fn generation_in_progress() -> Response {
    (
        StatusCode::CONFLICT,
        Json(ErrorResponse::new("generation in progress")),
    )
        .into_response()
}

/// POST /chat/share_messages
///
/// Every message must belong to one of the caller's conversations.
pub async fn share_messages(
    State(state): State<GatewayState>,
    Extension(user): Extension<UserAccount>,
    body: Result<Json<ShareBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    let message_ids = match parse_message_ids(&body.message_ids) {
        Ok(ids) if ids.is_empty() => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("no messages to share")),
            )
                .into_response();
        }
        Ok(ids) => ids,
        Err(message) => {
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response();
        }
    };

    let mut owned: Vec<ConversationId> = Vec::new();
    for &message_id in &message_ids {
        let message = match state.store.message(message_id).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                return error_response(&ParleyError::NotFound(format!("message {message_id}")));
            }
            Err(e) => return error_response(&e),
        };
        if owned.contains(&message.conversation_id) {
            continue;
        }
        if let Err(e) = owned_conversation(&state, &user, message.conversation_id).await {
            return error_response(&e);
        }
        owned.push(message.conversation_id);
    }

    match state.store.create_share(user.id, &message_ids).await {
        Ok(share_id) => {
            tracing::info!(
                user_id = user.id,
                share_id = %share_id,
                messages = message_ids.len(),
                "share created"
            );
            Json(ShareResponse {
                success: true,
                share_id,
            })
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// GET /chat/{share_id}
///
/// Public: the share id is the only credential.
pub async fn shared_messages(
    State(state): State<GatewayState>,
    Path(share_id): Path<String>,
) -> Response {
    match state.store.shared_messages(&share_id).await {
        Ok(Some(messages)) => Json(SharedMessagesResponse {
            success: true,
            messages: messages.into_iter().map(MessageView::from).collect(),
        })
        .into_response(),
        Ok(None) => error_response(&ParleyError::NotFound(format!("share {share_id}"))),
        Err(e) => error_response(&e),
    }
}

/// POST /chat/delete_message
///
/// Refuses while the message's conversation has a running generation.
pub async fn delete_message(
    State(state): State<GatewayState>,
    Extension(user): Extension<UserAccount>,
    body: Result<Json<MessageBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    let message_id = body.message_id;

    let message = match state.store.message(message_id).await {
        Ok(Some(message)) => message,
        Ok(None) => return error_response(&ParleyError::NotFound(format!("message {message_id}"))),
        Err(e) => return error_response(&e),
    };
    if let Err(e) = owned_conversation(&state, &user, message.conversation_id).await {
        return error_response(&e);
    }
    if state.engine.is_generating(message.conversation_id) {
        return generation_in_progress();
    }
    if let Err(e) = state.store.delete_message(message_id).await {
        return error_response(&e);
    }
    tracing::info!(
        message_id,
        conversation_id = message.conversation_id,
        "message deleted"
    );
    Json(SuccessResponse { success: true }).into_response()
}

/// GET /health
pub async fn health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        active_generations: state.engine.active_generations(),
    })
}
