// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Sleep-poll quanta and protocol defaults carried over from the reference
//! implementation (`original_source/MDC`), where they are literal `#define`s.

use std::time::Duration;

/// Poll granularity while waiting for a connect attempt to complete.
pub const CS_SLEEP_TIME: Duration = Duration::from_millis(1);
/// Poll granularity while waiting for a service-selection reply (ACK/NAK).
pub const SR_SLEEP_TIME: Duration = Duration::from_millis(10);
/// Poll granularity while waiting for a send-request to complete.
pub const SNDREQ_SLEEP_TIME: Duration = Duration::from_millis(10);
/// How long the server blocks on a single transport poll iteration.
pub const DEF_POLLTIME: Duration = Duration::from_millis(1000);

/// Default new-service (connect) timeout.
pub const DEFAULT_NEW_SERVICE_TIMEOUT: Duration = Duration::from_millis(30_000);
/// Default service-request (login/change-service reply) timeout.
pub const DEFAULT_SERVICE_REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Default send-request (request completion) timeout.
pub const DEFAULT_SEND_REQUEST_TIMEOUT: Duration = Duration::from_millis(5_400_000);

/// Default client/server keep-alive interval.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_millis(1000);

/// Default service name resolved when no explicit port is supplied.
pub const DEFAULT_SERVICE_NAME: &str = "vdwd";

/// Width of each fixed, null-padded credential field (user/password/server/
/// database/...).
pub const CREDENTIAL_FIELD_LEN: usize = 20;

/// Default cap on the size of the NAK text buffer stored per channel,
/// mirroring `MAX_ERRMSGLEN` in the reference implementation.
pub const DEFAULT_MAX_NAK_TEXT_LEN: usize = 1024;
