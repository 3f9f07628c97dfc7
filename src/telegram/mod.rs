//! Telegram bot integration, handlers and the Mini App API

pub mod bot;
pub mod format;
pub mod handlers;
pub mod keyboards;
pub mod markdown;
pub mod notifications;
pub mod webapp;
pub mod webapp_auth;

pub type Bot = teloxide::Bot;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use notifications::{run_report_notifier, QuestionMessage, QuestionMessages};
pub use webapp::{create_webapp_router, run_webapp_server, WebAppState};
