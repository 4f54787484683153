// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The service-selection payload carried inside `INIT`/`CHANGE` packets
//! (§3): a service-kind byte followed by a fixed-width, null-padded
//! credential layout. Both peers must agree on field widths byte-exact,
//! since there is no length prefix at this layer.

use anyhow::{Context, Result, bail, ensure};

use crate::constants::CREDENTIAL_FIELD_LEN;

/// The recognized back-end kinds, keyed by their single-byte wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// `S` — Sybase database access.
    Sybase,
    /// `O` — ODBC access.
    Odbc,
    /// `F` — FTP driver.
    Ftp,
    /// `J` — Java code execution.
    Java,
    /// `C` — system-command execution driver.
    SystemCommand,
    /// `A` — audio player driver.
    Audio,
}

impl ServiceKind {
    fn wire_tag(self) -> u8 {
        match self {
            ServiceKind::Sybase => b'S',
            ServiceKind::Odbc => b'O',
            ServiceKind::Ftp => b'F',
            ServiceKind::Java => b'J',
            ServiceKind::SystemCommand => b'C',
            ServiceKind::Audio => b'A',
        }
    }

    fn from_wire_tag(b: u8) -> Result<Self> {
        Ok(match b {
            b'S' => ServiceKind::Sybase,
            b'O' => ServiceKind::Odbc,
            b'F' => ServiceKind::Ftp,
            b'J' => ServiceKind::Java,
            b'C' => ServiceKind::SystemCommand,
            b'A' => ServiceKind::Audio,
            other => bail!("unrecognized service kind byte: 0x{other:02x}"),
        })
    }
}

/// Database credentials shared by the Sybase and ODBC service kinds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DatabaseCredentials {
    pub user: String,
    pub password: String,
    pub server: String,
    pub database: String,
}

/// Credentials carried by the FTP service kind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FtpCredentials {
    pub server: String,
    pub user: String,
    pub password: String,
}

/// A tagged union identifying a back-end kind and its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceDetails {
    Sybase(DatabaseCredentials),
    Odbc(DatabaseCredentials),
    Ftp(FtpCredentials),
    Java,
    SystemCommand,
    Audio,
}

impl ServiceDetails {
    pub fn kind(&self) -> ServiceKind {
        match self {
            ServiceDetails::Sybase(_) => ServiceKind::Sybase,
            ServiceDetails::Odbc(_) => ServiceKind::Odbc,
            ServiceDetails::Ftp(_) => ServiceKind::Ftp,
            ServiceDetails::Java => ServiceKind::Java,
            ServiceDetails::SystemCommand => ServiceKind::SystemCommand,
            ServiceDetails::Audio => ServiceKind::Audio,
        }
    }

    /// Encode into the wire layout: kind byte followed by zero or more
    /// fixed-width, null-padded fields.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = vec![self.kind().wire_tag()];
        match self {
            ServiceDetails::Sybase(c) | ServiceDetails::Odbc(c) => {
                push_field(&mut out, &c.user)?;
                push_field(&mut out, &c.password)?;
                push_field(&mut out, &c.server)?;
                push_field(&mut out, &c.database)?;
            },
            ServiceDetails::Ftp(c) => {
                push_field(&mut out, &c.server)?;
                push_field(&mut out, &c.user)?;
                push_field(&mut out, &c.password)?;
            },
            ServiceDetails::Java | ServiceDetails::SystemCommand | ServiceDetails::Audio => {},
        }
        Ok(out)
    }

    /// Decode from the wire layout produced by [`ServiceDetails::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (&kind_byte, rest) = bytes
            .split_first()
            .context("service-selection payload is empty")?;
        let kind = ServiceKind::from_wire_tag(kind_byte)?;
        Ok(match kind {
            ServiceKind::Sybase | ServiceKind::Odbc => {
                ensure!(
                    rest.len() == 4 * CREDENTIAL_FIELD_LEN,
                    "expected {} credential bytes, got {}",
                    4 * CREDENTIAL_FIELD_LEN,
                    rest.len()
                );
                let creds = DatabaseCredentials {
                    user: pop_field(&rest[0..CREDENTIAL_FIELD_LEN])?,
                    password: pop_field(
                        &rest[CREDENTIAL_FIELD_LEN..2 * CREDENTIAL_FIELD_LEN],
                    )?,
                    server: pop_field(
                        &rest[2 * CREDENTIAL_FIELD_LEN..3 * CREDENTIAL_FIELD_LEN],
                    )?,
                    database: pop_field(
                        &rest[3 * CREDENTIAL_FIELD_LEN..4 * CREDENTIAL_FIELD_LEN],
                    )?,
                };
                if kind == ServiceKind::Sybase {
                    ServiceDetails::Sybase(creds)
                } else {
                    ServiceDetails::Odbc(creds)
                }
            },
            ServiceKind::Ftp => {
                ensure!(
                    rest.len() == 3 * CREDENTIAL_FIELD_LEN,
                    "expected {} credential bytes, got {}",
                    3 * CREDENTIAL_FIELD_LEN,
                    rest.len()
                );
                ServiceDetails::Ftp(FtpCredentials {
                    server: pop_field(&rest[0..CREDENTIAL_FIELD_LEN])?,
                    user: pop_field(
                        &rest[CREDENTIAL_FIELD_LEN..2 * CREDENTIAL_FIELD_LEN],
                    )?,
                    password: pop_field(
                        &rest[2 * CREDENTIAL_FIELD_LEN..3 * CREDENTIAL_FIELD_LEN],
                    )?,
                })
            },
            ServiceKind::Java => ServiceDetails::Java,
            ServiceKind::SystemCommand => ServiceDetails::SystemCommand,
            ServiceKind::Audio => ServiceDetails::Audio,
        })
    }
}

fn push_field(out: &mut Vec<u8>, value: &str) -> Result<()> {
    ensure!(
        value.len() <= CREDENTIAL_FIELD_LEN,
        "field '{value}' exceeds {CREDENTIAL_FIELD_LEN} bytes"
    );
    let start = out.len();
    out.resize(start + CREDENTIAL_FIELD_LEN, 0);
    out[start..start + value.len()].copy_from_slice(value.as_bytes());
    Ok(())
}

fn pop_field(field: &[u8]) -> Result<String> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    Ok(std::str::from_utf8(&field[..end])
        .context("credential field is not valid UTF-8")?
        .to_string())
}
