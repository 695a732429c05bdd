//! video2article - Turn online videos into readable articles
//!
//! Entry point for the `v2a` command.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use video2article::cli::Args;
use video2article::config::Config;
use video2article::download::YtDlpDownloader;
use video2article::generate::{BackendSelector, OpenAiClient};
use video2article::pipeline::{Pipeline, RunSettings};

const DEFAULT_CONFIG_FILE: &str = "v2a.toml";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };
    args.apply_to(&mut config)?;

    if let Some(path) = &args.dump_config {
        config.save_to_file(path)?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    let provider = Arc::new(OpenAiClient::from_config(&config.remote)?);
    let selector = BackendSelector::new(provider, config.local.clone());
    let backend = selector
        .select(&config.model, config.generation.clone())
        .await?;
    info!("Using {} backend for model {}", backend.kind(), config.model);

    let pipeline = Pipeline::new(
        RunSettings::from(&config),
        Box::new(backend),
        Box::new(YtDlpDownloader::new(config.download.clone())),
    );
    let report = pipeline.run_batch(&args.video_urls).await;

    println!();
    for (url, path) in &report.succeeded {
        println!("OK     {} -> {}", url, path.display());
    }
    for (url, error) in &report.failed {
        println!("FAILED {}: {}", url, error);
    }

    if !report.is_success() {
        anyhow::bail!(
            "{} of {} videos failed",
            report.failed.len(),
            args.video_urls.len()
        );
    }

    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".v2a").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "v2a.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Flushes on drop; the process owns the writer until exit
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("v2a.log").display()
    );

    Ok(())
}
