//! Telegram bot handler tree configuration
//!
//! The handlers are organized in a testable way, allowing tests to use the
//! same handler tree as production code.

mod callbacks;
mod commands;
mod schema;
mod types;

pub use schema::schema;
pub use types::{player_of, HandlerDeps, HandlerError};
