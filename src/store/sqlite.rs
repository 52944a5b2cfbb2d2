use std::fs;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use tracing::debug;

use crate::error::StoreError;
use crate::testing::report::RunReport;

/// One stored run, without its per-case outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub suite: String,
    pub started_at_ms: u64,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub success_rate: f64,
}

impl RunSummary {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_id: row.get(0)?,
            suite: row.get(1)?,
            started_at_ms: row.get::<_, i64>(2)? as u64,
            total: row.get::<_, i64>(3)? as usize,
            passed: row.get::<_, i64>(4)? as usize,
            failed: row.get::<_, i64>(5)? as usize,
            success_rate: row.get(6)?,
        })
    }
}

pub struct HistoryStore {
    conn: Connection,
}

impl HistoryStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(StoreError::sqlite("open SQLite"))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(StoreError::sqlite("set SQLite journal mode"))?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::sqlite("open SQLite"))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS runs (
             run_id TEXT PRIMARY KEY,
             suite TEXT NOT NULL,
             started_at_ms INTEGER NOT NULL,
             total INTEGER NOT NULL,
             passed INTEGER NOT NULL,
             failed INTEGER NOT NULL,
             success_rate REAL NOT NULL,
             report_json TEXT NOT NULL
           );
           CREATE INDEX IF NOT EXISTS runs_started_at ON runs (started_at_ms DESC);",
        )
        .map_err(StoreError::sqlite("initialize SQLite schema"))?;
        Ok(Self { conn })
    }

    pub fn record(&self, report: &RunReport) -> Result<(), StoreError> {
        let report_json = serde_json::to_string(report)?;
        self.conn
            .execute(
                "INSERT INTO runs
                   (run_id, suite, started_at_ms, total, passed, failed, success_rate, report_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(run_id)
                 DO UPDATE SET
                   suite = excluded.suite,
                   started_at_ms = excluded.started_at_ms,
                   total = excluded.total,
                   passed = excluded.passed,
                   failed = excluded.failed,
                   success_rate = excluded.success_rate,
                   report_json = excluded.report_json;",
                params![
                    report.run_id,
                    report.suite,
                    report.started_at_ms as i64,
                    report.total as i64,
                    report.passed as i64,
                    report.failed as i64,
                    report.success_rate,
                    report_json,
                ],
            )
            .map_err(StoreError::sqlite("save run to SQLite"))?;
        debug!(run_id = %report.run_id, "stored run");
        Ok(())
    }

    /// Most recent runs first.
    pub fn recent(&self, limit: usize) -> Result<Vec<RunSummary>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT run_id, suite, started_at_ms, total, passed, failed, success_rate
                 FROM runs
                 ORDER BY started_at_ms DESC, rowid DESC
                 LIMIT ?1;",
            )
            .map_err(StoreError::sqlite("query run history"))?;
        let rows = stmt
            .query_map(params![limit as i64], RunSummary::from_row)
            .map_err(StoreError::sqlite("query run history"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::sqlite("read run history"))
    }

    pub fn load(&self, run_id: &str) -> Result<Option<RunReport>, StoreError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT report_json FROM runs WHERE run_id = ?1 LIMIT 1;",
                params![run_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::sqlite("load run from SQLite"))?;
        json.map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(StoreError::from)
    }
}
