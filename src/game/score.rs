//! Durable score contract and an in-memory implementation.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use super::types::{Level, PlayerId, SessionId};
use crate::core::config;
use crate::core::error::{AppError, AppResult};

/// One finished session's contribution to a player's total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreCommit {
    pub session_id: SessionId,
    pub player: PlayerId,
    pub level: Level,
    pub delta: u32,
}

/// A player's standing in one level after a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommittedTotal {
    /// Cumulative points over all sessions
    pub total: i64,
    /// Best single-session score
    pub best: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub player: PlayerId,
    pub username: String,
    pub score: i64,
}

/// Per-player score persistence.
///
/// `add_points` must be atomic per player and idempotent per session id.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Adds `commit.delta` to the player's total for the level.
    async fn add_points(&self, commit: &ScoreCommit) -> AppResult<CommittedTotal>;

    async fn standing(&self, player: PlayerId, level: Level) -> AppResult<CommittedTotal>;

    /// Stores or renames the player's leaderboard name.
    async fn register(&self, player: PlayerId, name: &str) -> AppResult<()>;

    /// The registered leaderboard name, if any.
    async fn player_name(&self, player: PlayerId) -> AppResult<Option<String>>;

    async fn is_registered(&self, player: PlayerId) -> AppResult<bool> {
        Ok(self.player_name(player).await?.is_some())
    }

    /// Highest cumulative totals first.
    async fn leaderboard(&self, level: Level, limit: usize) -> AppResult<Vec<LeaderboardEntry>>;
}

/// Trims a leaderboard name and checks its length.
pub fn normalize_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }
    if name.chars().count() > config::players::MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "name must be at most {} characters",
            config::players::MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

/// Name shown for players that never registered one.
pub const ANONYMOUS_NAME: &str = "Player";

#[derive(Debug, Clone, Default)]
struct Record {
    name: Option<String>,
    school: CommittedTotal,
    university: CommittedTotal,
}

impl Record {
    fn tier(&self, level: Level) -> CommittedTotal {
        match level {
            Level::School => self.school,
            Level::University => self.university,
        }
    }

    fn tier_mut(&mut self, level: Level) -> &mut CommittedTotal {
        match level {
            Level::School => &mut self.school,
            Level::University => &mut self.university,
        }
    }
}

/// Score store kept in process memory. Used by tests and `serve` without a database.
#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    records: DashMap<PlayerId, Record>,
    committed: DashMap<SessionId, CommittedTotal>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions committed so far.
    pub fn commit_count(&self) -> usize {
        self.committed.len()
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn add_points(&self, commit: &ScoreCommit) -> AppResult<CommittedTotal> {
        match self.committed.entry(commit.session_id) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => {
                let mut record = self.records.entry(commit.player).or_default();
                let tier = record.tier_mut(commit.level);
                tier.total += i64::from(commit.delta);
                tier.best = tier.best.max(i64::from(commit.delta));
                let result = *tier;
                entry.insert(result);
                Ok(result)
            }
        }
    }

    async fn standing(&self, player: PlayerId, level: Level) -> AppResult<CommittedTotal> {
        Ok(self
            .records
            .get(&player)
            .map(|record| record.tier(level))
            .unwrap_or_default())
    }

    async fn register(&self, player: PlayerId, name: &str) -> AppResult<()> {
        let name = normalize_name(name)?;
        self.records.entry(player).or_default().name = Some(name);
        Ok(())
    }

    async fn player_name(&self, player: PlayerId) -> AppResult<Option<String>> {
        Ok(self.records.get(&player).and_then(|record| record.name.clone()))
    }

    async fn leaderboard(&self, level: Level, limit: usize) -> AppResult<Vec<LeaderboardEntry>> {
        let mut entries: Vec<LeaderboardEntry> = self
            .records
            .iter()
            .map(|record| LeaderboardEntry {
                player: *record.key(),
                username: record.name.clone().unwrap_or_else(|| ANONYMOUS_NAME.to_string()),
                score: record.tier(level).total,
            })
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score).then(a.player.cmp(&b.player)));
        entries.truncate(limit);
        Ok(entries)
    }
}
