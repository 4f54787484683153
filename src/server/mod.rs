// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The server engine (§4.E): [`engine::ServerEngine`] and the
//! [`handler::ServiceHandler`] trait its dispatch loop invokes.

pub mod engine;
pub mod handler;

pub use engine::{ControlEvent, ControlSink, ServerEngine};
pub use handler::{EchoHandler, ServiceHandler, SystemCommandHandler};
