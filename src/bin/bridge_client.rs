// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use daemon_bridge::{
    cfg::{cli::resolve_config_path, config::Config, logger::init_logger},
    client::ClientSession,
    protocol::{IdentityCodec, ServiceDetails},
    transport::tcp::TcpTransport,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _init_logger = init_logger("config/logger.yaml")?;

    let cfg = resolve_config_path("config/bridge.yaml")
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    let session = ClientSession::with_max_nak_text_len(
        Arc::new(TcpTransport::new()),
        Arc::new(IdentityCodec),
        cfg.session.max_nak_text_len,
    );
    session.start().await.context("session start failed")?;

    let host = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1".to_string());
    let port = cfg.server.bind_port;

    let channel = session
        .create_service(&host, port, ServiceDetails::SystemCommand)
        .await
        .context("create_service failed")?;
    info!(channel, "service created");

    let command = std::env::args().nth(2).unwrap_or_else(|| "echo hello".to_string());
    let sink = Arc::new(|channel, bytes: bytes::Bytes| {
        info!(channel, bytes = %String::from_utf8_lossy(&bytes), "received DATA frame");
    });
    session
        .send_request(channel, command.as_bytes(), sink)
        .await
        .context("send_request failed")?;

    match session.get_result(channel).await {
        Ok(()) => info!(channel, "request completed"),
        Err(e) => info!(channel, error = %e, "request failed"),
    }

    session
        .close_service(channel)
        .await
        .context("close_service failed")?;
    session.end().await.context("session end failed")?;

    Ok(())
}
