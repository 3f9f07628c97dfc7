//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use mathgame::core::error::{AppError, AppResult};
use mathgame::core::retry::RetryConfig;
use mathgame::game::{
    CommittedTotal, GameError, LeaderboardEntry, Level, MemoryScoreStore, PlayerId, Question, QuestionBank,
    ScoreCommit, ScoreStore, SessionManager, SessionReport, Topic,
};
use mathgame::storage::{create_pool, DbPool};
use mathgame::telegram::webapp_auth::sign_init_data;
use tokio::sync::mpsc;

pub const TEST_BOT_TOKEN: &str = "123456:integration-test-token";

/// Question bank that hands out a fixed list in order, for any topic.
pub struct ScriptedBank {
    questions: Vec<(String, i64)>,
}

impl ScriptedBank {
    pub fn new(questions: &[(&str, i64)]) -> Self {
        Self {
            questions: questions
                .iter()
                .map(|(prompt, answer)| (prompt.to_string(), *answer))
                .collect(),
        }
    }

    /// `n` questions "q1 = ?" .. "qn = ?" with answers 1..=n.
    pub fn numbered(n: i64) -> Self {
        let prompts: Vec<String> = (1..=n).map(|i| format!("q{} = ?", i)).collect();
        Self {
            questions: prompts.into_iter().zip(1..=n).collect(),
        }
    }
}

impl QuestionBank for ScriptedBank {
    fn next(&self, level: Level, topic: Topic, asked: &HashSet<String>) -> Result<Question, GameError> {
        let (prompt, answer) = self
            .questions
            .iter()
            .find(|(prompt, _)| !asked.contains(prompt))
            .ok_or(GameError::NoQuestionAvailable { level, topic })?;

        Ok(Question {
            topic,
            prompt: prompt.clone(),
            answer: *answer,
            choices: vec![*answer, answer + 1, answer + 2, answer + 3],
            points: topic.points(),
        })
    }
}

/// Score store whose first `failures` commits fail with SQLITE_BUSY.
pub struct FlakyStore {
    inner: MemoryScoreStore,
    failures: AtomicU32,
    pub commit_calls: AtomicU32,
}

impl FlakyStore {
    pub fn new(failures: u32) -> Self {
        Self {
            inner: MemoryScoreStore::new(),
            failures: AtomicU32::new(failures),
            commit_calls: AtomicU32::new(0),
        }
    }

    pub fn commit_count(&self) -> usize {
        self.inner.commit_count()
    }
}

pub fn busy_error() -> AppError {
    AppError::Database(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
        Some("database is locked".to_string()),
    ))
}

#[async_trait]
impl ScoreStore for FlakyStore {
    async fn add_points(&self, commit: &ScoreCommit) -> AppResult<CommittedTotal> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(busy_error());
        }
        self.inner.add_points(commit).await
    }

    async fn standing(&self, player: PlayerId, level: Level) -> AppResult<CommittedTotal> {
        self.inner.standing(player, level).await
    }

    async fn register(&self, player: PlayerId, name: &str) -> AppResult<()> {
        self.inner.register(player, name).await
    }

    async fn player_name(&self, player: PlayerId) -> AppResult<Option<String>> {
        self.inner.player_name(player).await
    }

    async fn leaderboard(&self, level: Level, limit: usize) -> AppResult<Vec<LeaderboardEntry>> {
        self.inner.leaderboard(level, limit).await
    }
}

/// Commit retries without real waiting.
pub fn fast_commit_retry() -> RetryConfig {
    RetryConfig::new()
        .max_retries(3)
        .initial_delay(Duration::from_millis(1))
        .no_jitter()
}

pub fn manager_with(
    bank: impl QuestionBank + 'static,
    store: Arc<dyn ScoreStore>,
) -> (Arc<SessionManager>, mpsc::UnboundedReceiver<SessionReport>) {
    SessionManager::with_commit_retry(Arc::new(bank), store, fast_commit_retry())
}

/// A migrated database in a temporary directory. Keep the `TempDir` alive.
pub fn temp_pool() -> (TempDir, Arc<DbPool>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("math_game.db");
    let pool = create_pool(path.to_str().expect("utf-8 path")).expect("pool");
    (dir, Arc::new(pool))
}

/// Init data for `user_id` signed with [`TEST_BOT_TOKEN`], issued now.
pub fn init_data_for(user_id: i64, first_name: &str) -> String {
    let user = serde_json::json!({ "id": user_id, "first_name": first_name }).to_string();
    let auth_date = chrono::Utc::now().timestamp().to_string();
    sign_init_data(&[("user", &user), ("auth_date", &auth_date)], TEST_BOT_TOKEN).expect("sign")
}
