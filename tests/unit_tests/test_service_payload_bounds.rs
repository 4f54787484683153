// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use daemon_bridge::protocol::ServiceDetails;

#[test]
fn from_bytes_rejects_empty_payload() {
    let err = ServiceDetails::from_bytes(&[]).unwrap_err();
    assert!(err.to_string().contains("empty"));
}

#[test]
fn from_bytes_rejects_unrecognized_kind_byte() {
    let err = ServiceDetails::from_bytes(b"Zjunk").unwrap_err();
    assert!(err.to_string().contains("unrecognized service kind"));
}

#[test]
fn from_bytes_rejects_short_credential_payload() {
    // `S` (Sybase) demands 4 fixed-width fields; one short byte isn't enough.
    let err = ServiceDetails::from_bytes(b"S\0").unwrap_err();
    assert!(err.to_string().contains("expected"));
}

#[test]
fn field_exactly_at_the_width_limit_is_accepted() {
    use daemon_bridge::{constants::CREDENTIAL_FIELD_LEN, protocol::service::FtpCredentials};

    let details = ServiceDetails::Ftp(FtpCredentials {
        server: "s".repeat(CREDENTIAL_FIELD_LEN),
        user: String::new(),
        password: String::new(),
    });
    let bytes = details.to_bytes().expect("exactly-at-limit field is valid");
    let back = ServiceDetails::from_bytes(&bytes).expect("decode");
    assert_eq!(back, details);
}
