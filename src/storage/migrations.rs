use rusqlite::Connection;
use std::sync::{Mutex, OnceLock};

use crate::core::config;
use crate::core::error::AppResult;

mod embedded {
    use refinery::embed_migrations;

    embed_migrations!("./migrations");
}

static MIGRATION_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Applies pending schema migrations. Returns the number applied.
///
/// refinery wraps each migration in its own transaction; concurrent runners in
/// other processes wait on the SQLite busy timeout.
pub fn run_migrations(conn: &mut Connection) -> AppResult<usize> {
    // Serialize migrations per-process
    let mutex = MIGRATION_LOCK.get_or_init(|| Mutex::new(()));
    let _guard = match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Migration lock was poisoned, recovering...");
            poisoned.into_inner()
        }
    };

    conn.busy_timeout(config::database::busy_timeout())?;

    let report = embedded::migrations::runner().run(conn)?;
    let applied = report.applied_migrations().len();
    for migration in report.applied_migrations() {
        log::info!("Applied migration {}", migration);
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(run_migrations(&mut conn).unwrap(), 3);
        assert_eq!(run_migrations(&mut conn).unwrap(), 0);

        let columns: Vec<String> = conn
            .prepare("SELECT name FROM pragma_table_info('students')")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(columns.contains(&"school_best".to_string()));
        assert!(columns.contains(&"uni_best".to_string()));
    }

    #[test]
    fn test_legacy_table_is_upgraded() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE students (user_id INTEGER PRIMARY KEY, username TEXT,
                                    school_points INTEGER DEFAULT 0, uni_points INTEGER DEFAULT 0);
             INSERT INTO students (user_id, username, school_points) VALUES (1, 'Ada', 12);",
        )
        .unwrap();

        run_migrations(&mut conn).unwrap();

        let (points, best): (i64, i64) = conn
            .query_row("SELECT school_points, school_best FROM students WHERE user_id = 1", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!((points, best), (12, 0));
    }
}
