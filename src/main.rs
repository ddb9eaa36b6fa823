mod change_detector;
mod commands;
mod config;
mod error;
mod log_client;
mod log_panel;
mod renderer;
mod scheduler;
mod types;
mod view_state;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use simple_logger::SimpleLogger;
use std::sync::Arc;
use tokio::sync::mpsc;

const COMMAND_CHANNEL_CAPACITY: usize = 32;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = config::Cli::parse();

    let level = cli
        .log_level
        .parse::<log::LevelFilter>()
        .map_err(|_| anyhow::anyhow!("Invalid log level: {}", cli.log_level))?;
    SimpleLogger::new()
        .with_level(level)
        .env()
        .init()
        .context("Failed to initialize logger")?;

    info!("Starting device-log-viewer");

    // Load configuration
    let config = config::load_config(&cli)?;
    info!("Configuration loaded successfully");

    let source = log_client::HttpLogSource::new(&config)?;
    info!("Polling {}", source.logs_url());

    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    commands::spawn_stdin_reader(command_tx)?;

    println!("{}", commands::HELP);
    let panel = log_panel::LogPanel::new(Arc::new(source), config.refresh());
    panel.run(command_rx, std::io::stdout()).await
}
