use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Result, TransactionBehavior};

use super::migrations::run_migrations;
use crate::core::config;
use crate::core::error::AppResult;
use crate::game::score::ANONYMOUS_NAME;
use crate::game::{CommittedTotal, LeaderboardEntry, Level, PlayerId, ScoreCommit};

/// A row of the `students` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    /// Telegram user id
    pub user_id: i64,
    /// Leaderboard name, `None` until the player registers
    pub username: Option<String>,
    pub school_points: i64,
    pub uni_points: i64,
    pub school_best: i64,
    pub uni_best: i64,
}

impl Student {
    pub fn standing(&self, level: Level) -> CommittedTotal {
        match level {
            Level::School => CommittedTotal {
                total: self.school_points,
                best: self.school_best,
            },
            Level::University => CommittedTotal {
                total: self.uni_points,
                best: self.uni_best,
            },
        }
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Every connection gets the configured busy timeout, and schema migrations are
/// applied before the pool is handed out.
///
/// # Example
///
/// ```no_run
/// use mathgame::storage::db;
///
/// let pool = db::create_pool("math_game.db")?;
/// # Ok::<(), mathgame::core::AppError>(())
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.busy_timeout(config::database::busy_timeout()));
    let pool = Pool::builder()
        .max_size(config::database::POOL_MAX_SIZE)
        .build(manager)?;

    let mut conn = pool.get()?;
    let applied = run_migrations(&mut conn)?;
    if applied > 0 {
        log::info!("Database {} migrated ({} migrations applied)", database_path, applied);
    }

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

fn level_columns(level: Level) -> (&'static str, &'static str) {
    match level {
        Level::School => ("school_points", "school_best"),
        Level::University => ("uni_points", "uni_best"),
    }
}

/// Creates the student or renames an existing one.
pub fn register_student(conn: &Connection, user_id: i64, username: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO students (user_id, username) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET username = excluded.username",
        params![user_id, username],
    )?;
    Ok(())
}

/// Returns `Ok(None)` if the student does not exist.
pub fn get_student(conn: &Connection, user_id: i64) -> Result<Option<Student>> {
    conn.query_row(
        "SELECT user_id, username, COALESCE(school_points, 0), COALESCE(uni_points, 0), school_best, uni_best
         FROM students WHERE user_id = ?1",
        params![user_id],
        |row| {
            Ok(Student {
                user_id: row.get(0)?,
                username: row.get(1)?,
                school_points: row.get(2)?,
                uni_points: row.get(3)?,
                school_best: row.get(4)?,
                uni_best: row.get(5)?,
            })
        },
    )
    .optional()
}

/// Adds a finished session's score to the student's total for its level.
///
/// Runs in one immediate transaction. A session id that was already committed
/// leaves the totals untouched and returns the current standing.
pub fn add_points(conn: &mut Connection, commit: &ScoreCommit) -> Result<CommittedTotal> {
    let (total_column, best_column) = level_columns(commit.level);
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let fresh = tx.execute(
        "INSERT OR IGNORE INTO session_commits (session_id, user_id, level, delta) VALUES (?1, ?2, ?3, ?4)",
        params![
            commit.session_id.to_string(),
            commit.player.0,
            commit.level.to_string(),
            commit.delta
        ],
    )? == 1;

    if fresh {
        tx.execute("INSERT OR IGNORE INTO students (user_id) VALUES (?1)", params![commit.player.0])?;
        tx.execute(
            &format!(
                "UPDATE students SET {total} = COALESCE({total}, 0) + ?1, {best} = MAX({best}, ?1) WHERE user_id = ?2",
                total = total_column,
                best = best_column
            ),
            params![commit.delta, commit.player.0],
        )?;
    } else {
        log::debug!("Session {} already committed, skipping", commit.session_id);
    }

    let standing = tx
        .query_row(
            &format!(
                "SELECT COALESCE({}, 0), {} FROM students WHERE user_id = ?1",
                total_column, best_column
            ),
            params![commit.player.0],
            |row| {
                Ok(CommittedTotal {
                    total: row.get(0)?,
                    best: row.get(1)?,
                })
            },
        )
        .optional()?
        .unwrap_or_default();

    tx.commit()?;
    Ok(standing)
}

/// Cumulative total and best session score for the level. Zero for unknown students.
pub fn get_standing(conn: &Connection, player: PlayerId, level: Level) -> Result<CommittedTotal> {
    Ok(get_student(conn, player.0)?
        .map(|student| student.standing(level))
        .unwrap_or_default())
}

/// Highest cumulative totals for the level; ties go to the older account.
pub fn top_students(conn: &Connection, level: Level, limit: usize) -> Result<Vec<LeaderboardEntry>> {
    let (total_column, _) = level_columns(level);
    let mut stmt = conn.prepare(&format!(
        "SELECT user_id, username, COALESCE({column}, 0) AS score FROM students
         ORDER BY score DESC, user_id ASC LIMIT ?1",
        column = total_column
    ))?;

    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = stmt.query_map(params![limit], |row| {
        let username: Option<String> = row.get(1)?;
        Ok(LeaderboardEntry {
            player: PlayerId(row.get(0)?),
            username: username.unwrap_or_else(|| ANONYMOUS_NAME.to_string()),
            score: row.get(2)?,
        })
    })?;

    rows.collect()
}
