//! Autorename - Telegram bot that renames media files.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - SQLite storage and repositories
//! - `cache` - TTL caches with Moka
//! - `permissions` - Owner/admin/ban checks with caching
//! - `template` - Filename templates
//! - `media` - Download, probe, rename, tag and upload pipeline
//! - `session` - Pending prompts and running jobs
//! - `bot` - Dispatcher and runtime (with Throttle for API rate limiting)
//! - `plugins` - Command and callback handlers
//! - `events` - Media, photo and text handlers
//! - `utils` - Utility functions

mod bot;
mod cache;
mod config;
mod database;
mod events;
mod media;
mod permissions;
mod plugins;
mod session;
mod template;
mod utils;

use std::sync::Arc;

use anyhow::Context;
use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bot::dispatcher::AppState;
use config::Config;
use database::Database;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    // RUST_LOG wins over LOG_LEVEL
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting autorename bot...");
    info!("Bot mode: {:?}", config.bot_mode);

    for dir in [&config.download_path, &config.temp_path] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    let db = Database::open(&config.database_path)?;
    info!("Database opened at {}", config.database_path.display());

    // Throttle respects Telegram's global and per-chat limits
    let mut raw_bot = Bot::new(&config.bot_token);
    if let Some(api_url) = &config.bot_api_url {
        raw_bot = raw_bot.set_api_url(api_url.clone());
        info!("Using Bot API server {}", api_url);
    }
    let bot = raw_bot.throttle(Limits::default());

    let me = bot.get_me().await?;
    info!("Bot username: @{}", me.username());

    if config.owner_ids.is_empty() {
        warn!("No owner configured (OWNER_ID is empty)");
    } else {
        info!("Bot owners: {:?}", config.owner_ids);
    }

    if let Err(e) = bot.set_my_commands(plugins::user_commands()).await {
        warn!("Failed to register the command menu: {}", e);
    }

    let config = Arc::new(config);
    let state = AppState::new(bot.clone(), &db, Arc::clone(&config));

    // Directories of running jobs are never swept, however long they take.
    let jobs = state.jobs.clone();
    media::cleanup::spawn_sweeper(
        vec![config.download_path.clone(), config.temp_path.clone()],
        media::cleanup::SWEEP_INTERVAL,
        media::cleanup::MAX_FILE_AGE,
        move |path| media::cleanup::job_dir_owner(path).is_some_and(|uid| jobs.is_busy(uid)),
    );
    let dispatcher = bot::build_dispatcher(bot.clone(), state);

    bot::run(&config, bot, dispatcher).await
}
