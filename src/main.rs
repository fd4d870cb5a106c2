//! Media Archive Bot - Main Entry Point
//!
//! A Telegram bot that collects media from allow-listed users and sends
//! it back batched into zip archives.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use teloxide::dptree;
use teloxide::prelude::*;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use media_archive_bot::commands::CommandHandler;
use media_archive_bot::config::Settings;
use media_archive_bot::scheduler::{ArchiveScheduler, SchedulerMessage};
use media_archive_bot::session::SessionRegistry;
use media_archive_bot::telegram::{MediaGateway, schema};

/// Telegram bot that batches incoming media into zip archives.
#[derive(Parser, Debug)]
#[command(name = "archive_bot")]
#[command(about = "Batch incoming Telegram media into zip archives")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    // Load configuration
    let settings =
        Settings::from_env().context("Failed to load configuration from environment")?;

    if settings.allowed_users.is_empty() {
        warn!("ALLOWED_USERS is empty: every Telegram user may use this bot");
    }

    std::fs::create_dir_all(&settings.tmp_root).with_context(|| {
        format!("Failed to create temp root {}", settings.tmp_root.display())
    })?;

    info!(
        "Temp root: {} (archive: {}, delay: {:?}, volume limit: {} bytes)",
        settings.tmp_root.display(),
        settings.archive_name,
        settings.archive_delay,
        settings.archive_size_limit_bytes
    );

    // Recover batches a previous run left behind
    let registry = Arc::new(SessionRegistry::new(settings.tmp_root.clone()));
    let (recovered, removed) = registry
        .restore_from_disk()
        .await
        .context("Failed to scan temp root for leftover sessions")?;
    if recovered > 0 || removed > 0 {
        info!(
            "Startup sweep: {} batch(es) recovered, {} stale dir(s) removed",
            recovered, removed
        );
    }

    let bot = Bot::new(settings.bot_token.clone());
    let gateway = Arc::new(MediaGateway::new(bot.clone(), settings.download_timeout));
    let command_handler = Arc::new(CommandHandler::new(
        Arc::clone(&registry),
        settings.archive_delay,
    ));

    // Create scheduler channel
    let (scheduler_tx, scheduler_rx) = mpsc::channel::<SchedulerMessage>(32);

    // Spawn the archive scheduler
    let scheduler = ArchiveScheduler::new(Arc::clone(&registry), Arc::clone(&gateway), &settings);
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(scheduler_rx).await;
    });

    let settings = Arc::new(settings);

    info!("Starting archive bot...");
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![
            Arc::clone(&settings),
            Arc::clone(&registry),
            Arc::clone(&gateway),
            Arc::clone(&command_handler),
            scheduler_tx.clone()
        ])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    // Cleanup
    info!("Shutting down...");
    let _ = scheduler_tx.send(SchedulerMessage::Shutdown).await;
    let _ = scheduler_handle.await;

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
