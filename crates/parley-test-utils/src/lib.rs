// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Parley integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockLlm`] - Scripted LLM client with streaming steps and queued completions
//! - [`TestHarness`] - Temp SQLite store, seeded user and conversation, and engine

pub mod harness;
pub mod mock_llm;

pub use harness::{default_models, TestHarness, TEST_API_TOKEN};
pub use mock_llm::{MockLlm, MockStep};
