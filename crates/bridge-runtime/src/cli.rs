//! Command line and configuration loading.
//!
//! Precedence, lowest first: built-in defaults, the TOML file named by
//! `--config`, environment variables, command-line flags. clap resolves the
//! last two (a flag beats its `env` fallback), so only the file layer is
//! merged by hand.

use anyhow::{Context, Result};
use clap::Parser;
use sb_gateway::BridgeConfig;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Parser)]
#[command(name = "bridge-runtime", version, about = "Short-poll bridge to a sandboxed host application")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Bind address for the HTTP listener
    #[arg(long, env = "BRIDGE_HOST")]
    pub host: Option<IpAddr>,

    /// Port the host application polls
    #[arg(short, long, env = "BRIDGE_PORT")]
    pub port: Option<u16>,

    /// Second, independent bridge on another port
    #[arg(long, env = "BRIDGE_LEGACY_PORT")]
    pub legacy_port: Option<u16>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "BRIDGE_LOG", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Serve HTTP only, without the stdin/stdout JSON-RPC front
    #[arg(long)]
    pub no_stdio: bool,
}

impl Cli {
    /// Defaults, then the config file, then env/flag overrides. The result
    /// is validated.
    pub fn load_config(&self) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => read_config_file(path)?,
            None => BridgeConfig::default(),
        };
        self.apply_overrides(&mut config);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut BridgeConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.legacy_port.is_some() {
            config.server.legacy_port = self.legacy_port;
        }
    }
}

pub fn read_config_file(path: &Path) -> Result<BridgeConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config = parse_config(&raw).with_context(|| format!("parsing {}", path.display()))?;
    info!(path = %path.display(), "Loaded configuration file");
    Ok(config)
}

pub fn parse_config(raw: &str) -> Result<BridgeConfig, toml::de::Error> {
    toml::from_str(raw)
}
