// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The client engine (§4.D): [`ClientSession`] and its public operations.

pub mod engine;
pub mod session;

pub use session::{ClientSession, TimeoutName, Timeouts, global};
