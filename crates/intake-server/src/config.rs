//! Server configuration: TOML file + environment + CLI overrides.
//!
//! Precedence, lowest to highest: config file, `INTAKE_WS_PORT` /
//! `INTAKE_HTTP_PORT` environment variables, CLI flags.

use intake_core::{RelayError, RelayResult};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            ws_port: default_ws_port(),
            http_port: default_http_port(),
            bind_addr: default_bind_addr(),
        }
    }
}

// Local development defaults: WebSocket relay on 8080, snapshot API next to it.
fn default_ws_port() -> u16 {
    8080
}
fn default_http_port() -> u16 {
    8081
}
fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

/// Resolved server configuration (file, environment, and CLI merged).
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: String,
    pub ws_port: u16,
    pub http_port: u16,
}

impl RelayConfig {
    /// Load config from a TOML file, then apply environment and CLI overrides.
    pub fn load(
        config_path: Option<&Path>,
        cli_ws_port: Option<u16>,
        cli_http_port: Option<u16>,
    ) -> RelayResult<Self> {
        let file_config = match config_path {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "loading config file");
                let content = std::fs::read_to_string(path)?;
                toml::from_str::<ConfigFile>(&content)
                    .map_err(|e| RelayError::Other(format!("config parse error: {e}")))?
            }
            Some(path) => {
                info!(path = %path.display(), "config file not found, using defaults");
                ConfigFile::default()
            }
            None => ConfigFile::default(),
        };

        let ws_port = cli_ws_port
            .or_else(|| env_port("INTAKE_WS_PORT"))
            .unwrap_or(file_config.server.ws_port);
        let http_port = cli_http_port
            .or_else(|| env_port("INTAKE_HTTP_PORT"))
            .unwrap_or(file_config.server.http_port);

        Ok(Self {
            bind_addr: file_config.server.bind_addr,
            ws_port,
            http_port,
        })
    }
}

/// Read a port from the environment, ignoring absent or unparseable values.
fn env_port(var: &str) -> Option<u16> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}
