// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The user-supplied back-end driver (§4.E "Service handler trait"): every
//! real back-end (database, FTP, shell) is out of scope here, modeled
//! instead as an opaque `(request bytes, error buffer) -> ok/fail +
//! optional stream of reply bytes` handler. Two illustrative handlers
//! stand in for it: [`EchoHandler`] and [`SystemCommandHandler`], the one
//! driver kind (`SRV_SCMD`) named in the glossary.

use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{
    io::{AsyncReadExt, BufReader},
    process::Command,
    sync::mpsc,
};
use tracing::{debug, warn};

/// The server-side back-end driver contract. Returning `Ok(Some(rx))`
/// streams zero or more `DATA` frames (drained from `rx` by the server
/// engine) before the final `ACK`; `Ok(None)` sends an immediate `ACK`
/// with no data frames; `Err` (or writing into `error` before returning
/// `Err`) sends a `NAK` carrying that text.
#[async_trait]
pub trait ServiceHandler: Send + Sync {
    async fn handle(
        &self,
        request: Bytes,
        error: &mut String,
    ) -> anyhow::Result<Option<mpsc::Receiver<Bytes>>>;
}

/// Streams the request back verbatim as a single `DATA` frame. Stands in
/// for a trivial back-end that just needs the FIFO/ACK/NAK plumbing
/// exercised without a real driver behind it.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

#[async_trait]
impl ServiceHandler for EchoHandler {
    async fn handle(
        &self,
        request: Bytes,
        _error: &mut String,
    ) -> anyhow::Result<Option<mpsc::Receiver<Bytes>>> {
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(request).await;
        Ok(Some(rx))
    }
}

/// Runs the request as a shell command via [`tokio::process::Command`],
/// streaming stdout chunks back as `DATA` frames. The one back-end kind
/// named in the glossary (`C` / system-command) that is safe and
/// meaningful to actually implement.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandHandler;

#[async_trait]
impl ServiceHandler for SystemCommandHandler {
    async fn handle(
        &self,
        request: Bytes,
        error: &mut String,
    ) -> anyhow::Result<Option<mpsc::Receiver<Bytes>>> {
        let command_line = match std::str::from_utf8(&request) {
            Ok(s) => s.trim(),
            Err(_) => {
                error.push_str("command is not valid UTF-8");
                return Err(anyhow::anyhow!("command is not valid UTF-8"));
            },
        };

        let mut parts = command_line.split_whitespace();
        let Some(program) = parts.next() else {
            error.push_str("empty command");
            return Err(anyhow::anyhow!("empty command"));
        };

        let mut child = match Command::new(program)
            .args(parts)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(c) => c,
            Err(e) => {
                error.push_str(&format!("failed to spawn {program}: {e}"));
                return Err(e.into());
            },
        };

        let Some(stdout) = child.stdout.take() else {
            error.push_str("command produced no stdout handle");
            return Err(anyhow::anyhow!("missing stdout handle"));
        };

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut buf = vec![0u8; 4096];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
                            break;
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "system-command stdout read failed");
                        break;
                    },
                }
            }
            match child.wait().await {
                Ok(status) => debug!(%status, "system-command exited"),
                Err(e) => warn!(error = %e, "failed to wait on system-command"),
            }
        });

        Ok(Some(rx))
    }
}
