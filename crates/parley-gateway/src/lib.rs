// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Parley chat backend.
//!
//! Streams generations to clients as Server-Sent Events and exposes the
//! conversation endpoints that own the data the engine mutates. All chat
//! routes require `Authorization: Bearer <api_token>`.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, start_server, GatewayState, HealthState, ServerConfig};
pub use sse::WireEvent;
