//! Logging initialization and configuration checking
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Startup diagnostics for the environment configuration

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    // teloxide and hyper are chatty at info level
    let config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, config, log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the environment configuration at application startup
///
/// Validates and logs:
/// - BOT_TOKEN presence (never the value)
/// - Database path
/// - Mini App URL and API port
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🧮 Configuration Check");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if config::BOT_TOKEN.is_empty() {
        log::error!("❌ BOT_TOKEN: not set (the bot cannot start and Mini App auth will reject everything)");
    } else {
        log::info!("✅ BOT_TOKEN: set ({} chars)", config::BOT_TOKEN.len());
    }

    log::info!("✅ DATABASE_PATH: {}", config::DATABASE_PATH.as_str());

    if let Some(ref api_url) = *config::BOT_API_URL {
        log::info!("✅ BOT_API_URL: {}", api_url);
    }

    match *config::WEBAPP_URL {
        Some(ref url) => log::info!("✅ WEBAPP_URL: {}", url),
        None => log::warn!("⚠️  WEBAPP_URL: not set (no Mini App button in /start)"),
    }

    match *config::WEBAPP_PORT {
        Some(port) => log::info!(
            "✅ WEBAPP_PORT: {} (static files from {})",
            port,
            config::WEBAPP_STATIC_DIR.as_str()
        ),
        None => log::info!("ℹ️  WEBAPP_PORT: not set (Mini App API disabled)"),
    }

    log::info!(
        "⏳ Timers: School {}s, University {}s",
        config::game::SCHOOL_TIMER_SECS,
        config::game::UNIVERSITY_TIMER_SECS
    );
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
