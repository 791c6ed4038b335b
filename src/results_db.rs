use crate::app_dirs::AppDirs;
use crate::error::PersistError;
use crate::persistence::{ResultSink, TestResult};
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// A result row as read back from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub username: Option<String>,
    pub result: TestResult,
    pub created_at: DateTime<Local>,
}

/// SQLite store of finished tests.
#[derive(Debug)]
pub struct ResultsDb {
    conn: Mutex<Connection>,
    username: Option<String>,
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS test_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT,
        wpm INTEGER NOT NULL,
        raw_wpm INTEGER NOT NULL,
        accuracy INTEGER NOT NULL,
        burst_wpm INTEGER NOT NULL,
        total_errors INTEGER NOT NULL,
        time_mode INTEGER NOT NULL,
        test_duration INTEGER NOT NULL,
        consistency INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_test_results_created ON test_results(created_at);
"#;

impl ResultsDb {
    /// Opens (creating if needed) the database under the state directory.
    pub fn new() -> Result<Self, PersistError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("sakhatype_results.db"));
        Self::open(path)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, PersistError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, PersistError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            username: None,
        })
    }

    /// Tags every stored row with `username`.
    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, PersistError> {
        self.conn.lock().map_err(|_| PersistError::LockPoisoned)
    }

    pub fn record(&self, result: &TestResult) -> Result<(), PersistError> {
        self.conn()?.execute(
            r#"
            INSERT INTO test_results
            (username, wpm, raw_wpm, accuracy, burst_wpm, total_errors,
             time_mode, test_duration, consistency, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                self.username,
                result.wpm,
                result.raw_wpm,
                result.accuracy,
                result.burst_wpm,
                result.total_errors,
                result.time_mode,
                result.test_duration,
                result.consistency,
                Local::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Most recent results first.
    pub fn recent(&self, limit: usize) -> Result<Vec<StoredResult>, PersistError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT username, wpm, raw_wpm, accuracy, burst_wpm, total_errors,
                   time_mode, test_duration, consistency, created_at
            FROM test_results
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map([limit as i64], read_row)?;
        let results = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(results)
    }

    pub fn best_wpm(&self) -> Result<Option<u32>, PersistError> {
        let best = self
            .conn()?
            .query_row("SELECT MAX(wpm) FROM test_results", [], |row| row.get(0))?;
        Ok(best)
    }

    pub fn count(&self) -> Result<u64, PersistError> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM test_results", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn clear(&self) -> Result<(), PersistError> {
        self.conn()?.execute("DELETE FROM test_results", [])?;
        Ok(())
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<StoredResult> {
    let created: String = row.get(9)?;
    let created_at = DateTime::parse_from_rfc3339(&created)
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                9,
                "created_at".to_string(),
                rusqlite::types::Type::Text,
            )
        })?
        .with_timezone(&Local);

    Ok(StoredResult {
        username: row.get(0)?,
        result: TestResult {
            wpm: row.get(1)?,
            raw_wpm: row.get(2)?,
            accuracy: row.get(3)?,
            burst_wpm: row.get(4)?,
            total_errors: row.get(5)?,
            time_mode: row.get(6)?,
            test_duration: row.get(7)?,
            consistency: row.get(8)?,
        },
        created_at,
    })
}

impl ResultSink for ResultsDb {
    fn submit(&self, result: &TestResult) -> Result<(), PersistError> {
        self.record(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn result(wpm: u32) -> TestResult {
        TestResult {
            wpm,
            raw_wpm: wpm + 4,
            accuracy: 96,
            burst_wpm: wpm + 20,
            total_errors: 2,
            time_mode: 30,
            test_duration: 30,
            consistency: 80,
        }
    }

    #[test]
    fn test_record_and_read_back() {
        let db = ResultsDb::open_in_memory()
            .unwrap()
            .with_username(Some("aiaal".into()));
        db.record(&result(55)).unwrap();

        let rows = db.recent(10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].result, result(55));
        assert_eq!(rows[0].username.as_deref(), Some("aiaal"));
    }

    #[test]
    fn test_recent_is_newest_first_and_limited() {
        let db = ResultsDb::open_in_memory().unwrap();
        for wpm in [30, 40, 50] {
            db.record(&result(wpm)).unwrap();
        }

        let rows = db.recent(2).unwrap();
        let wpms: Vec<u32> = rows.iter().map(|r| r.result.wpm).collect();
        assert_eq!(wpms, vec![50, 40]);
    }

    #[test]
    fn test_best_and_count() {
        let db = ResultsDb::open_in_memory().unwrap();
        assert_eq!(db.best_wpm().unwrap(), None);
        assert_eq!(db.count().unwrap(), 0);

        db.record(&result(48)).unwrap();
        db.record(&result(71)).unwrap();
        db.record(&result(63)).unwrap();

        assert_eq!(db.best_wpm().unwrap(), Some(71));
        assert_eq!(db.count().unwrap(), 3);
    }

    #[test]
    fn test_clear_removes_everything() {
        let db = ResultsDb::open_in_memory().unwrap();
        db.record(&result(48)).unwrap();
        db.clear().unwrap();
        assert_eq!(db.count().unwrap(), 0);
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("results.db");
        {
            let db = ResultsDb::open(&path).unwrap();
            db.submit(&result(52)).unwrap();
        }
        assert!(path.exists());

        let reopened = ResultsDb::open(&path).unwrap();
        assert_eq!(reopened.best_wpm().unwrap(), Some(52));
    }
}
