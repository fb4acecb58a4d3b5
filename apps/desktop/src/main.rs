use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{ClientConfig, SessionController};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod render;
mod shell;

use config::{load_settings, normalize_api_url};

#[derive(Parser, Debug)]
#[command(name = "doorquest", about = "Terminal client for the DoorQuest account service")]
struct Args {
    /// Backend base address; overrides config file and environment.
    #[arg(long)]
    api_url: Option<String>,
    /// Config file (defaults to ./doorquest.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    log_level: Option<String>,
    /// Per-request timeout in seconds; 0 disables it.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(api_url) = args.api_url {
        settings.api_url = normalize_api_url(&api_url);
    }
    if let Some(secs) = args.timeout_secs {
        settings.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
    if let Some(log_level) = args.log_level {
        settings.log_filter = log_level;
    }

    let filter = EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let client_config = ClientConfig::new(&settings.api_url)
        .with_context(|| format!("invalid api url '{}'", settings.api_url))?
        .with_request_timeout(settings.request_timeout);
    info!(api_url = %client_config.base_url, "starting doorquest client");

    let controller = SessionController::new(client_config).context("failed to build http client")?;
    controller.startup().await;
    println!("{}", render::render_snapshot(&controller.snapshot().await));
    println!("type `help` for commands");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    shell::run(controller, stdin, tokio::io::stdout()).await
}
