// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Session and server parameters that are not part of the wire protocol
//! (§6 **[ADDED]** "Configuration file"): listen address, default service
//! name, per-phase timeouts, keepalive interval, max NAK text length.
//! Loaded from YAML via `serde`/`serde_yaml`, the same mechanism the
//! teacher uses for its own `Config`.

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_KEEPALIVE, DEFAULT_MAX_NAK_TEXT_LEN, DEFAULT_NEW_SERVICE_TIMEOUT,
    DEFAULT_SEND_REQUEST_TIMEOUT, DEFAULT_SERVICE_NAME, DEFAULT_SERVICE_REQUEST_TIMEOUT,
};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Parameters shared by both the client session and the server engine.
    pub session: SessionConfig,
    /// Server-only parameters (bind address, etc).
    pub server: ServerConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
/// Session-wide knobs (§3 "Session record").
pub struct SessionConfig {
    #[serde(rename = "DefaultServiceName", default = "default_service_name")]
    /// Service name resolved via the transport when no explicit port is
    /// given.
    pub default_service_name: String,

    #[serde(rename = "KeepAliveMs", default = "default_keepalive_ms")]
    /// Client/server keep-alive interval.
    pub keepalive_ms: u64,

    #[serde(rename = "MaxNakTextLen", default = "default_max_nak_text_len")]
    /// Cap on the NAK text buffer stored per channel.
    pub max_nak_text_len: usize,

    #[serde(rename = "Timeouts")]
    /// The three per-phase millisecond timeouts (§3).
    pub timeouts: TimeoutsConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
/// The three blocking-wait timeouts (§3/§6), defaulting to
/// 30000 / 10000 / 5400000 ms.
pub struct TimeoutsConfig {
    #[serde(rename = "NewServiceMs", default = "default_new_service_ms")]
    pub new_service_ms: u64,
    #[serde(rename = "ServiceRequestMs", default = "default_service_request_ms")]
    pub service_request_ms: u64,
    #[serde(rename = "SendRequestMs", default = "default_send_request_ms")]
    pub send_request_ms: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
/// Where the server listens.
pub struct ServerConfig {
    #[serde(rename = "BindHost", default = "default_bind_host")]
    pub bind_host: String,
    #[serde(rename = "BindPort", skip_serializing_if = "Option::is_none")]
    /// Explicit listen port; when absent the server resolves
    /// `session.default_service_name` via the transport instead.
    pub bind_port: Option<u16>,
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

fn default_keepalive_ms() -> u64 {
    DEFAULT_KEEPALIVE.as_millis() as u64
}

fn default_max_nak_text_len() -> usize {
    DEFAULT_MAX_NAK_TEXT_LEN
}

fn default_new_service_ms() -> u64 {
    DEFAULT_NEW_SERVICE_TIMEOUT.as_millis() as u64
}

fn default_service_request_ms() -> u64 {
    DEFAULT_SERVICE_REQUEST_TIMEOUT.as_millis() as u64
}

fn default_send_request_ms() -> u64 {
    DEFAULT_SEND_REQUEST_TIMEOUT.as_millis() as u64
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

impl TimeoutsConfig {
    pub fn new_service(&self) -> Duration {
        Duration::from_millis(self.new_service_ms)
    }

    pub fn service_request(&self) -> Duration {
        Duration::from_millis(self.service_request_ms)
    }

    pub fn send_request(&self) -> Duration {
        Duration::from_millis(self.send_request_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            session: SessionConfig {
                default_service_name: default_service_name(),
                keepalive_ms: default_keepalive_ms(),
                max_nak_text_len: default_max_nak_text_len(),
                timeouts: TimeoutsConfig {
                    new_service_ms: default_new_service_ms(),
                    service_request_ms: default_service_request_ms(),
                    send_request_ms: default_send_request_ms(),
                },
            },
            server: ServerConfig {
                bind_host: default_bind_host(),
                bind_port: None,
            },
        }
    }
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(
            !self.session.default_service_name.is_empty(),
            "DefaultServiceName must not be empty"
        );
        ensure!(
            self.session.timeouts.new_service_ms > 0,
            "Timeouts.NewServiceMs must be > 0"
        );
        ensure!(
            self.session.timeouts.service_request_ms > 0,
            "Timeouts.ServiceRequestMs must be > 0"
        );
        ensure!(
            self.session.timeouts.send_request_ms > 0,
            "Timeouts.SendRequestMs must be > 0"
        );
        ensure!(
            self.session.max_nak_text_len > 0,
            "MaxNakTextLen must be > 0"
        );
        if let Some(port) = self.server.bind_port {
            ensure!(port > 0, "BindPort must be > 0 when set explicitly");
        }
        Ok(())
    }
}
