// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token authentication for the chat routes.
//!
//! `Authorization: Bearer <api_token>` is resolved to a user through the
//! store. The resolved [`UserAccount`] is inserted into the request
//! extensions for handlers to extract.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use parley_core::types::UserAccount;
use parley_core::ParleyError;

use crate::handlers::ErrorResponse;
use crate::server::GatewayState;

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

/// Rejects requests without a known bearer token.
pub async fn auth_middleware(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&request) else {
        return unauthorized();
    };

    match state.store.user_by_token(&token).await {
        Ok(Some(user)) => {
            tracing::debug!(user_id = user.id, "request authenticated");
            request.extensions_mut().insert::<UserAccount>(user);
            next.run(request).await
        }
        Ok(None) => unauthorized(),
        Err(e) => {
            tracing::error!(error = %e, "token lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(ParleyError::Unauthorized.to_string())),
    )
        .into_response()
}
