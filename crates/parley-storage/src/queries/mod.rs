// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions, one module per table.

pub mod conversations;
pub mod ledger;
pub mod messages;
pub mod shares;
pub mod users;
