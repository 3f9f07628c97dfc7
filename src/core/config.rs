use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
/// Also used as the HMAC key source for Mini App init data validation
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Custom Bot API server URL (local telegram-bot-api)
/// Read from BOT_API_URL environment variable
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok());

/// Database file path
/// Read from DATABASE_PATH (or legacy DB_FILE) environment variable
/// Default: math_game.db
pub static DATABASE_PATH: Lazy<String> = Lazy::new(|| {
    env::var("DATABASE_PATH")
        .or_else(|_| env::var("DB_FILE"))
        .unwrap_or_else(|_| "math_game.db".to_string())
});

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: mathgame.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "mathgame.log".to_string()));

/// Public HTTPS URL of the Mini App front-end
/// Read from WEBAPP_URL environment variable
/// When set, /start shows a "Play in Mini App" button
pub static WEBAPP_URL: Lazy<Option<String>> =
    Lazy::new(|| env::var("WEBAPP_URL").ok().filter(|url| !url.trim().is_empty()));

/// Port for the Mini App API server
/// Read from WEBAPP_PORT environment variable
/// The server is not started by `run` when unset or invalid
pub static WEBAPP_PORT: Lazy<Option<u16>> = Lazy::new(|| {
    env::var("WEBAPP_PORT").ok().and_then(|port| match port.parse::<u16>() {
        Ok(p) => Some(p),
        Err(_) => {
            log::warn!("Invalid WEBAPP_PORT value: {}", port);
            None
        }
    })
});

/// Directory with the Mini App static files (index.html, js, css)
/// Read from WEBAPP_STATIC_DIR environment variable
/// Default: webapp/static
pub static WEBAPP_STATIC_DIR: Lazy<String> =
    Lazy::new(|| env::var("WEBAPP_STATIC_DIR").unwrap_or_else(|_| "webapp/static".to_string()));

/// Game rules
pub mod game {
    use super::Duration;

    /// Seconds a School-level player has for each question
    pub const SCHOOL_TIMER_SECS: u64 = 15;

    /// Seconds a University-level player has for each question
    pub const UNIVERSITY_TIMER_SECS: u64 = 20;

    /// Points for a correct School / Easy answer
    pub const SCHOOL_EASY_POINTS: u32 = 1;

    /// Points for a correct School / Medium answer
    pub const SCHOOL_MEDIUM_POINTS: u32 = 2;

    /// Points for a correct answer on any University topic
    pub const UNIVERSITY_POINTS: u32 = 3;

    /// Number of answer buttons shown for each question
    pub const CHOICES_COUNT: usize = 4;

    /// Distractor spread for School questions
    pub const SCHOOL_SPREAD: i64 = 10;

    /// Minimum distractor spread for University questions
    /// (the actual spread grows with the answer magnitude)
    pub const UNIVERSITY_MIN_SPREAD: i64 = 20;

    /// How many times a generated topic is re-rolled to find an unused prompt
    pub const MAX_GENERATION_ATTEMPTS: usize = 64;

    pub fn school_timer() -> Duration {
        Duration::from_secs(SCHOOL_TIMER_SECS)
    }

    pub fn university_timer() -> Duration {
        Duration::from_secs(UNIVERSITY_TIMER_SECS)
    }
}

/// Player registration and leaderboard
pub mod players {
    /// Maximum length (in characters) of a leaderboard name
    pub const MAX_NAME_LEN: usize = 32;

    /// Number of rows shown on a leaderboard
    pub const LEADERBOARD_SIZE: usize = 10;

    /// Upper bound for the `limit` query parameter of the leaderboard API
    pub const LEADERBOARD_MAX_LIMIT: usize = 100;
}

/// Mini App configuration
pub mod webapp {
    /// Maximum age of Telegram init data before it is rejected (24 hours)
    pub const INIT_DATA_MAX_AGE_SECS: i64 = 86_400;

    /// Header carrying the raw init data string
    pub const INIT_DATA_HEADER: &str = "X-Telegram-Init-Data";
}

/// Retry configuration
pub mod retry {
    use super::Duration;

    /// Maximum number of retries for committing a session score
    pub const COMMIT_MAX_RETRIES: u32 = 3;

    /// Initial delay before the first commit retry (in milliseconds)
    pub const COMMIT_INITIAL_DELAY_MS: u64 = 200;

    /// Maximum number of retries for dispatcher reconnection
    pub const MAX_DISPATCHER_RETRIES: u32 = 5;

    /// Delay between dispatcher retry attempts (in seconds)
    pub const DISPATCHER_RETRY_DELAY_SECS: u64 = 5;

    pub fn commit_initial_delay() -> Duration {
        Duration::from_millis(COMMIT_INITIAL_DELAY_MS)
    }

    /// Dispatcher retry delay duration
    pub fn dispatcher_delay() -> Duration {
        Duration::from_secs(DISPATCHER_RETRY_DELAY_SECS)
    }
}

/// Database configuration
pub mod database {
    use super::Duration;

    /// Maximum number of pooled SQLite connections
    pub const POOL_MAX_SIZE: u32 = 8;

    /// How long SQLite waits on a locked database before returning SQLITE_BUSY
    pub const BUSY_TIMEOUT_SECS: u64 = 5;

    pub fn busy_timeout() -> Duration {
        Duration::from_secs(BUSY_TIMEOUT_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API HTTP requests (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}
