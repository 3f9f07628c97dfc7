//! [`ScoreStore`] backed by the SQLite pool.
//!
//! rusqlite is blocking, so every call runs on tokio's blocking pool.

use async_trait::async_trait;
use std::sync::Arc;

use super::db::{self, DbConnection, DbPool};
use crate::core::error::AppResult;
use crate::game::score::normalize_name;
use crate::game::{CommittedTotal, LeaderboardEntry, Level, PlayerId, ScoreCommit, ScoreStore};

#[derive(Clone)]
pub struct SqliteScoreStore {
    pool: Arc<DbPool>,
}

impl SqliteScoreStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<DbPool> {
        &self.pool
    }

    async fn with_connection<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut DbConnection) -> rusqlite::Result<T> + Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || -> AppResult<T> {
            let mut conn = db::get_connection(&pool)?;
            Ok(f(&mut conn)?)
        })
        .await?
    }
}

#[async_trait]
impl ScoreStore for SqliteScoreStore {
    async fn add_points(&self, commit: &ScoreCommit) -> AppResult<CommittedTotal> {
        let commit = commit.clone();
        self.with_connection(move |conn| db::add_points(conn, &commit)).await
    }

    async fn standing(&self, player: PlayerId, level: Level) -> AppResult<CommittedTotal> {
        self.with_connection(move |conn| db::get_standing(conn, player, level))
            .await
    }

    async fn register(&self, player: PlayerId, name: &str) -> AppResult<()> {
        let name = normalize_name(name)?;
        self.with_connection(move |conn| db::register_student(conn, player.0, &name))
            .await
    }

    async fn player_name(&self, player: PlayerId) -> AppResult<Option<String>> {
        let student = self.with_connection(move |conn| db::get_student(conn, player.0)).await?;
        Ok(student.and_then(|student| student.username))
    }

    async fn leaderboard(&self, level: Level, limit: usize) -> AppResult<Vec<LeaderboardEntry>> {
        self.with_connection(move |conn| db::top_students(conn, level, limit))
            .await
    }
}
