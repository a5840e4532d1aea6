// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inline provenance markers.
//!
//! Three markers travel inside stored message text:
//!
//! ```text
//! <think time=12>reasoning text</think>    reasoning-content column
//! <model=gpt-4o>assistant reply            content column, prefix only
//! <base64>data:image/png;...</base64>text  user content with an attached image
//! ```
//!
//! Decoders never panic. Input without a well-formed marker decodes to the
//! "absent" value with the original text as remainder.

pub mod base64;
pub mod model;
pub mod think;

pub use base64::ImageAttachment;
pub use model::ModelTagged;
pub use think::ThinkBlock;
