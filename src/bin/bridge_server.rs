// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use daemon_bridge::{
    cfg::{cli::resolve_config_path, config::Config, logger::init_logger},
    server::{ControlEvent, ServerEngine, SystemCommandHandler},
    transport::tcp::TcpTransport,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _init_logger = init_logger("config/logger.yaml")?;

    let cfg = resolve_config_path("config/bridge.yaml")
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    let transport = Arc::new(TcpTransport::new());
    let handler = Arc::new(SystemCommandHandler);
    let control_sink = Arc::new(|event: ControlEvent| match event {
        ControlEvent::Abort => warn!("client sent ABORT"),
        ControlEvent::Exit => info!("client sent EXIT, shutting down"),
    });

    let engine = ServerEngine::new(
        transport,
        Arc::new(daemon_bridge::protocol::IdentityCodec),
        handler,
        control_sink,
    );

    info!(bind_host = %cfg.server.bind_host, "starting bridge server");
    engine
        .serve(
            &cfg.server.bind_host,
            cfg.server.bind_port,
            Some(&cfg.session.default_service_name),
        )
        .await
        .context("server loop exited with an error")?;

    Ok(())
}
