use anyhow::Result;
use dotenvy::dotenv;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tokio::sync::mpsc;
use tokio::time::sleep;

use mathgame::cli::{Cli, Commands};
use mathgame::core::{config, init_logger, log_startup_configuration};
use mathgame::game::{Level, MathQuestionBank, ScoreStore, SessionManager, SessionReport};
use mathgame::storage::{create_pool, get_connection, DbPool, SqliteScoreStore};
use mathgame::telegram::{
    create_bot, run_report_notifier, run_webapp_server, schema, setup_bot_commands, HandlerDeps, QuestionMessages,
    WebAppState,
};

/// Port used by `serve` when neither `--port` nor WEBAPP_PORT is given
const DEFAULT_WEBAPP_PORT: u16 = 8080;

/// Main entry point for the math quiz bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics from spawned tasks instead of losing them with the task
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Load environment variables from .env if present (before any config is read)
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run) | None => run_bot().await,
        Some(Commands::Serve { port }) => run_serve(port).await,
        Some(Commands::Leaderboard { level, limit }) => run_leaderboard(&level, limit).await,
        Some(Commands::Migrate) => run_migrate(),
    }
}

fn open_database() -> Result<Arc<DbPool>> {
    let pool = create_pool(&config::DATABASE_PATH)
        .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;
    log::info!("Database ready at {}", config::DATABASE_PATH.as_str());
    Ok(Arc::new(pool))
}

fn create_manager(pool: Arc<DbPool>) -> (Arc<SessionManager>, mpsc::UnboundedReceiver<SessionReport>) {
    let store: Arc<dyn ScoreStore> = Arc::new(SqliteScoreStore::new(pool));
    SessionManager::new(Arc::new(MathQuestionBank::new()), store)
}

/// Run the `migrate` command
fn run_migrate() -> Result<()> {
    let pool = open_database()?;
    // create_pool already migrated; this only reports the result
    let conn = get_connection(&pool)?;
    let version: Option<i64> = conn
        .query_row("SELECT MAX(version) FROM refinery_schema_history", [], |row| row.get(0))
        .map_err(|e| anyhow::anyhow!("Failed to read schema version: {}", e))?;
    println!("Database schema is at version {}", version.unwrap_or(0));
    Ok(())
}

/// Run the `leaderboard` command
async fn run_leaderboard(level: &str, limit: usize) -> Result<()> {
    let level = Level::from_str(level).map_err(|_| anyhow::anyhow!("Unknown level: {}", level))?;
    let store = SqliteScoreStore::new(open_database()?);

    let entries = store.leaderboard(level, limit).await?;
    if entries.is_empty() {
        println!("No {} scores yet", level.display_name());
        return Ok(());
    }

    println!("{} leaderboard", level.display_name());
    for (place, entry) in entries.iter().enumerate() {
        println!("{:>3}. {:<32} {:>6}", place + 1, entry.username, entry.score);
    }
    Ok(())
}

/// Run the `serve` command: the Mini App API without the bot
async fn run_serve(port: Option<u16>) -> Result<()> {
    log_startup_configuration();

    let port = port.or(*config::WEBAPP_PORT).unwrap_or(DEFAULT_WEBAPP_PORT);
    let (manager, mut reports) = create_manager(open_database()?);

    // Nobody to notify without the bot; the Mini App polls /api/session instead
    tokio::spawn(async move {
        while let Some(report) = reports.recv().await {
            log::debug!("Session {} of player {} expired", report.session_id, report.player);
        }
    });

    run_webapp_server(port, WebAppState::new(manager, config::BOT_TOKEN.as_str())).await
}

/// Run the bot (default command)
async fn run_bot() -> Result<()> {
    let bot_init_start = std::time::Instant::now();
    log::info!("Starting bot...");
    log_startup_configuration();

    let db_pool = open_database()?;
    let (manager, reports) = create_manager(db_pool);

    let bot = create_bot()?;

    let bot_info = bot.get_me().await?;
    log::info!("Bot username: {:?}, Bot ID: {}", bot_info.username, bot_info.id);

    setup_bot_commands(&bot).await?;

    let question_messages = Arc::new(QuestionMessages::new());
    tokio::spawn(run_report_notifier(bot.clone(), reports, Arc::clone(&question_messages)));

    if let Some(port) = *config::WEBAPP_PORT {
        let state = WebAppState::new(Arc::clone(&manager), config::BOT_TOKEN.as_str());
        tokio::spawn(async move {
            if let Err(e) = run_webapp_server(port, state).await {
                log::error!("Mini App web server stopped: {}", e);
            }
        });
    }

    let handler_deps = HandlerDeps::new(Arc::clone(&manager), question_messages, config::WEBAPP_URL.clone());
    let handler = schema(handler_deps);

    log::info!("================================================");
    log::info!(
        "🎉 Bot initialization complete in {:.2}s",
        bot_init_start.elapsed().as_secs_f64()
    );
    log::info!("📡 Ready to receive updates!");
    log::info!("================================================");

    let mut retry_count = 0;
    let max_retries = config::retry::MAX_DISPATCHER_RETRIES;

    // Run the dispatcher with retry logic
    loop {
        let bot_clone = bot.clone();
        let handler_clone = handler.clone();

        // A separate task so a dispatcher panic surfaces through the JoinHandle
        let handle = tokio::spawn(async move {
            use teloxide::update_listeners::Polling;

            let listener = Polling::builder(bot_clone.clone()).drop_pending_updates().build();

            Dispatcher::builder(bot_clone, handler_clone)
                .dependencies(DependencyMap::new())
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        match handle.await {
            Ok(()) => {
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) if join_err.is_panic() => {
                log::error!("Dispatcher panicked: {}", join_err);

                if retry_count < max_retries {
                    retry_count += 1;
                    log::info!(
                        "Retrying dispatcher connection after panic (attempt {}/{})...",
                        retry_count,
                        max_retries
                    );
                    exponential_backoff(retry_count).await;
                } else {
                    log::error!("Max retries reached after panic. Exiting...");
                    break;
                }
            }
            Err(join_err) => {
                log::warn!("Dispatcher task was cancelled: {}", join_err);
                break;
            }
        }

        sleep(config::retry::dispatcher_delay()).await;
    }

    let stopped = manager.shutdown().await;
    log::info!("Stopped and committed {} sessions still running at shutdown", stopped.len());
    Ok(())
}

async fn exponential_backoff(retry_count: u32) {
    let delay = Duration::from_secs(2u64.pow(retry_count));
    sleep(delay).await;
}
