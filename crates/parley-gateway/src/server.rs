// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use parley_core::{ChatStore, ParleyError, SnowflakeGenerator};
use parley_engine::GenerationEngine;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::handlers;

/// Health state for the unauthenticated health endpoint.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<GenerationEngine>,
    /// Also used to resolve bearer tokens.
    pub store: Arc<dyn ChatStore>,
    /// Id source for new conversations.
    pub ids: Arc<SnowflakeGenerator>,
    pub health: HealthState,
}

impl GatewayState {
    pub fn new(
        engine: Arc<GenerationEngine>,
        store: Arc<dyn ChatStore>,
        ids: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            engine,
            store,
            ids,
            health: HealthState {
                start_time: std::time::Instant::now(),
            },
        }
    }
}

/// Gateway server configuration (mirrors `ServerConfig` from parley-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Builds the router:
/// - GET /health, GET /chat/{share_id} (public)
/// - POST /chat/generate, /chat/stop, /chat/thread_list,
///   /chat/new_conversation, /chat/conversations_list,
///   /chat/messages_list, /chat/delete_conversation,
///   /chat/share_messages, /chat/delete_message (bearer auth)
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/chat/{share_id}", get(handlers::shared_messages))
        .with_state(state.clone());

    let chat_routes = Router::new()
        .route("/chat/generate", post(handlers::generate))
        .route("/chat/stop", post(handlers::stop))
        .route("/chat/thread_list", post(handlers::thread_list))
        .route("/chat/new_conversation", post(handlers::new_conversation))
        .route("/chat/conversations_list", post(handlers::conversations_list))
        .route("/chat/messages_list", post(handlers::messages_list))
        .route("/chat/delete_conversation", post(handlers::delete_conversation))
        .route("/chat/share_messages", post(handlers::share_messages))
        .route("/chat/delete_message", post(handlers::delete_message))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(chat_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serves the gateway until `shutdown` is cancelled.
///
/// Open event streams keep the server alive until their generations end;
/// shut the engine down alongside to cut them short.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), ParleyError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ParleyError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ParleyError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
