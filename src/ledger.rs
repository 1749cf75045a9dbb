// 📒 Import Ledger - SQLite + WAL
// Append-only record of which source entries already exist in the target
// journal. Keyed by the stable source id, so re-runs skip what is done.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One successfully imported entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Stable id from the export (unique)
    pub source_id: String,

    /// Opaque id the importer reported (may be empty)
    pub target_id: String,

    pub source_path: String,

    /// Content hash at import time, for change detection
    pub content_hash: String,

    pub run_id: String,
    pub imported_at: DateTime<Utc>,
}

/// One invocation of `import`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub journal: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub dry_run: bool,
}

/// Open (or create) the ledger file and make sure the schema exists
pub fn open_ledger(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open ledger: {}", path.display()))?;
    setup_ledger(&conn).context("Failed to initialize ledger schema")?;
    Ok(conn)
}

pub fn setup_ledger(conn: &Connection) -> rusqlite::Result<()> {
    // WAL for crash safety: a run killed mid-way keeps every completed import
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Imports Table (insert-only, one row per source entry)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS imports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id TEXT UNIQUE NOT NULL,
            target_id TEXT NOT NULL,
            source_path TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            run_id TEXT NOT NULL,
            imported_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Runs Table (one row per import run, for the audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT UNIQUE NOT NULL,
            journal TEXT NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            succeeded INTEGER NOT NULL,
            failed INTEGER NOT NULL,
            skipped INTEGER NOT NULL,
            dry_run INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_imports_run ON imports(run_id)",
        [],
    )?;

    Ok(())
}

pub fn is_imported(conn: &Connection, source_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM imports WHERE source_id = ?1)",
        params![source_id],
        |row| row.get(0),
    )
}

pub fn get_import(conn: &Connection, source_id: &str) -> rusqlite::Result<Option<LedgerRecord>> {
    conn.query_row(
        "SELECT source_id, target_id, source_path, content_hash, run_id, imported_at
         FROM imports WHERE source_id = ?1",
        params![source_id],
        row_to_record,
    )
    .optional()
}

/// Insert one record; `Ok(false)` when the source id is already present
///
/// Existing rows are never updated.
pub fn record_import(conn: &Connection, record: &LedgerRecord) -> rusqlite::Result<bool> {
    let result = conn.execute(
        "INSERT INTO imports (
            source_id, target_id, source_path, content_hash, run_id, imported_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.source_id,
            record.target_id,
            record.source_path,
            record.content_hash,
            record.run_id,
            record.imported_at.to_rfc3339(),
        ],
    );

    match result {
        Ok(_) => Ok(true),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

pub fn get_all_imports(conn: &Connection) -> rusqlite::Result<Vec<LedgerRecord>> {
    let mut stmt = conn.prepare(
        "SELECT source_id, target_id, source_path, content_hash, run_id, imported_at
         FROM imports
         ORDER BY id",
    )?;

    let records = stmt
        .query_map([], row_to_record)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(records)
}

pub fn verify_count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM imports", [], |row| row.get(0))
}

pub fn record_run(conn: &Connection, run: &RunRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO runs (
            run_id, journal, started_at, finished_at, succeeded, failed, skipped, dry_run
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            run.run_id,
            run.journal,
            run.started_at.to_rfc3339(),
            run.finished_at.to_rfc3339(),
            run.succeeded as i64,
            run.failed as i64,
            run.skipped as i64,
            run.dry_run,
        ],
    )?;

    Ok(())
}

pub fn get_runs(conn: &Connection) -> rusqlite::Result<Vec<RunRecord>> {
    let mut stmt = conn.prepare(
        "SELECT run_id, journal, started_at, finished_at, succeeded, failed, skipped, dry_run
         FROM runs
         ORDER BY id",
    )?;

    let runs = stmt
        .query_map([], |row| {
            let started: String = row.get(2)?;
            let finished: String = row.get(3)?;
            let succeeded: i64 = row.get(4)?;
            let failed: i64 = row.get(5)?;
            let skipped: i64 = row.get(6)?;

            Ok(RunRecord {
                run_id: row.get(0)?,
                journal: row.get(1)?,
                started_at: parse_time(2, &started)?,
                finished_at: parse_time(3, &finished)?,
                succeeded: succeeded as usize,
                failed: failed as usize,
                skipped: skipped as usize,
                dry_run: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(runs)
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerRecord> {
    let imported_at: String = row.get(5)?;

    Ok(LedgerRecord {
        source_id: row.get(0)?,
        target_id: row.get(1)?,
        source_path: row.get(2)?,
        content_hash: row.get(3)?,
        run_id: row.get(4)?,
        imported_at: parse_time(5, &imported_at)?,
    })
}

fn parse_time(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ledger() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_ledger(&conn).unwrap();
        conn
    }

    fn record(source_id: &str) -> LedgerRecord {
        LedgerRecord {
            source_id: source_id.to_string(),
            target_id: "CB17A357BED34F6D838410CA96C7D9D1".to_string(),
            source_path: format!("/export/{}.json", source_id),
            content_hash: "hash".to_string(),
            run_id: "run-1".to_string(),
            imported_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_record_and_lookup() {
        let conn = ledger();

        assert!(!is_imported(&conn, "a").unwrap());
        assert!(record_import(&conn, &record("a")).unwrap());
        assert!(is_imported(&conn, "a").unwrap());

        let stored = get_import(&conn, "a").unwrap().unwrap();
        assert_eq!(stored, record("a"));
        assert!(get_import(&conn, "b").unwrap().is_none());
    }

    #[test]
    fn test_record_import_twice_is_duplicate() {
        let conn = ledger();

        assert!(record_import(&conn, &record("a")).unwrap());

        let mut changed = record("a");
        changed.target_id = "OTHER".to_string();
        assert!(!record_import(&conn, &changed).unwrap());

        // First write wins, nothing is updated
        assert_eq!(get_import(&conn, "a").unwrap().unwrap().target_id, record("a").target_id);
        assert_eq!(verify_count(&conn).unwrap(), 1);
    }

    #[test]
    fn test_get_all_imports_in_insert_order() {
        let conn = ledger();
        for id in ["c", "a", "b"] {
            record_import(&conn, &record(id)).unwrap();
        }

        let ids: Vec<String> = get_all_imports(&conn)
            .unwrap()
            .into_iter()
            .map(|r| r.source_id)
            .collect();

        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_runs_round_trip() {
        let conn = ledger();
        let run = RunRecord {
            run_id: "run-1".to_string(),
            journal: "Journal".to_string(),
            started_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            finished_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap(),
            succeeded: 3,
            failed: 1,
            skipped: 2,
            dry_run: false,
        };

        record_run(&conn, &run).unwrap();

        assert_eq!(get_runs(&conn).unwrap(), vec![run]);
    }

    #[test]
    fn test_open_ledger_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let conn = open_ledger(&path).unwrap();
            record_import(&conn, &record("a")).unwrap();
        }

        let conn = open_ledger(&path).unwrap();
        assert!(is_imported(&conn, "a").unwrap());
    }
}
