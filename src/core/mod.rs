//! Core utilities, configuration, errors, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;

// Re-exports for convenience
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_startup_configuration};
