use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(name = "device-log-viewer", version, about)]
pub struct Cli {
    /// Path to an optional TOML configuration file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Override backend base URL
    #[clap(long)]
    pub server_url: Option<String>,

    /// Override maximum number of records per fetch
    #[clap(long)]
    pub limit: Option<u32>,

    /// Override auto-refresh interval in seconds (0 = off)
    #[clap(long)]
    pub interval: Option<u64>,

    /// Diagnostic log level written to stderr (RUST_LOG takes precedence)
    #[clap(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub limit: u32,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:4711".to_string(),
            limit: 100,
            refresh_interval_secs: 0,
            request_timeout_secs: Some(30),
        }
    }
}

impl Config {
    pub fn refresh(&self) -> RefreshConfig {
        RefreshConfig {
            limit: self.limit,
            interval_secs: self.refresh_interval_secs,
        }
    }
}

/// User-controlled polling settings. Lives for the session only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Record cap, always positive.
    pub limit: u32,
    /// Zero disables auto-refresh.
    pub interval_secs: u64,
}

pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match cli.config {
        Some(ref path) => {
            let config_content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            parse_config(&config_content)?
        }
        None => Config::default(),
    };

    // Apply CLI overrides
    if let Some(ref server_url) = cli.server_url {
        config.server_url = server_url.clone();
    }

    if let Some(limit) = cli.limit {
        config.limit = limit;
    }

    if let Some(interval) = cli.interval {
        config.refresh_interval_secs = interval;
    }

    if config.limit == 0 {
        anyhow::bail!("limit must be a positive integer");
    }

    Ok(config)
}

fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).context("Failed to parse config file")
}
