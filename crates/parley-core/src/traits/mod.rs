// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Port definitions consumed by the generation engine.
//!
//! Every port extends the [`PluginAdapter`] base trait and uses
//! `#[async_trait]` so implementations can be held as trait objects.

pub mod adapter;
pub mod provider;
pub mod storage;

pub use adapter::PluginAdapter;
pub use provider::{DeltaStream, LlmClient};
pub use storage::ChatStore;
