// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

#![allow(clippy::all)]

mod integration_tests {
    pub mod common;

    pub mod connect_timeout;
    pub mod happy_request;
    pub mod oob_abort_on_server;
    pub mod orderly_shutdown;
    pub mod server_side_nak;
    pub mod wrong_state_call;
}
