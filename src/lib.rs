//! Mathgame - Telegram math quiz bot
//!
//! Players pick a level and a topic, then answer multiple-choice questions
//! against a per-question countdown. One wrong or late answer ends the game
//! and the points are added to the player's total for the level.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging and retry helpers
//! - `game`: question bank, timers, sessions and the score store contract
//! - `storage`: SQLite pool, migrations and the persistent score store
//! - `telegram`: bot handlers and the Mini App API

pub mod cli;
pub mod core;
pub mod game;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult};
pub use game::{SessionManager, SessionReport};
pub use storage::{create_pool, get_connection, DbConnection, DbPool, SqliteScoreStore};
