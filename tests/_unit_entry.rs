// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

#![allow(clippy::all)]

mod unit_tests {
    pub mod test_channel_state_transitions;
    pub mod test_nak_truncation;
    pub mod test_registry;
    pub mod test_service_payload_bounds;
    pub mod test_timeout_name;
}
