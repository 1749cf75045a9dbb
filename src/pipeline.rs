// 🚚 Import Pipeline - export directory → target journal
// Sequential: load → validate → ledger check → import → ledger record.
// A failing entry is counted and reported; it never stops the run.

use crate::error::EntryError;
use crate::export::load_entries;
use crate::importer::EntryImporter;
use crate::ledger::{self, LedgerRecord, RunRecord};
use crate::validate::{EntryValidator, ValidatedEntry, Validation};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

// ============================================================================
// OUTCOMES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Imported { target_id: String },
    Skipped { reason: String },
    Failed { kind: String, error: String },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Imported { .. } => "imported",
            Outcome::Skipped { .. } => "skipped",
            Outcome::Failed { .. } => "failed",
        }
    }

    fn failed(err: &EntryError) -> Self {
        Outcome::Failed {
            kind: err.kind().to_string(),
            error: err.to_string(),
        }
    }
}

/// What happened to one export file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryOutcome {
    pub source_path: PathBuf,
    pub source_id: Option<String>,
    pub outcome: Outcome,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub run_id: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<EntryOutcome>,
}

impl ImportSummary {
    fn count(&self, label: &str) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome.label() == label)
            .count()
    }

    pub fn succeeded(&self) -> usize {
        self.count("imported")
    }

    pub fn failed(&self) -> usize {
        self.count("failed")
    }

    pub fn skipped(&self) -> usize {
        self.count("skipped")
    }

    fn paths(&self, label: &str) -> Vec<&Path> {
        self.outcomes
            .iter()
            .filter(|o| o.outcome.label() == label)
            .map(|o| o.source_path.as_path())
            .collect()
    }

    pub fn failed_paths(&self) -> Vec<&Path> {
        self.paths("failed")
    }

    pub fn skipped_paths(&self) -> Vec<&Path> {
        self.paths("skipped")
    }

    /// "N succeeded, M failed, K skipped"
    pub fn tally_line(&self) -> String {
        format!(
            "{} succeeded, {} failed, {} skipped",
            self.succeeded(),
            self.failed(),
            self.skipped()
        )
    }

    /// SKIPPED/FAILED path lists, then the tally line
    pub fn print_result(&self) {
        print_paths("SKIPPED", &self.skipped_paths());
        print_paths("FAILED", &self.failed_paths());
        println!();
        println!("{}", self.tally_line());
    }

    pub fn to_run_record(&self, journal: &str) -> RunRecord {
        RunRecord {
            run_id: self.run_id.clone(),
            journal: journal.to_string(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            succeeded: self.succeeded(),
            failed: self.failed(),
            skipped: self.skipped(),
            dry_run: self.dry_run,
        }
    }
}

fn print_paths(prefix: &str, paths: &[&Path]) {
    if !paths.is_empty() {
        println!();
    }
    for path in paths {
        println!("{}: {}", prefix, path.display());
    }
}

// ============================================================================
// IMPORT RUN
// ============================================================================

pub struct ImportRun<'a> {
    conn: &'a Connection,
    importer: &'a mut dyn EntryImporter,
    validator: EntryValidator,
    journal: String,
    run_id: String,
}

impl<'a> ImportRun<'a> {
    pub fn new(
        conn: &'a Connection,
        importer: &'a mut dyn EntryImporter,
        validator: EntryValidator,
        journal: &str,
    ) -> Self {
        ImportRun {
            conn,
            importer,
            validator,
            journal: journal.to_string(),
            run_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Import every entry under `export_dir` and record the run in the ledger
    pub fn run(&mut self, export_dir: &Path) -> ImportSummary {
        let started_at = Utc::now();
        let mut outcomes = Vec::new();
        let mut pending = Vec::new();
        let mut seen = HashSet::new();

        // Phase 1: load, validate, ledger check
        for (path, loaded) in load_entries(export_dir) {
            let raw = match loaded {
                Ok(raw) => raw,
                Err(err) => {
                    error!("{}", err);
                    outcomes.push(EntryOutcome {
                        source_path: path,
                        source_id: None,
                        outcome: Outcome::failed(&err),
                        warnings: Vec::new(),
                    });
                    continue;
                }
            };

            match self.prepare(&raw, &mut seen) {
                Ok(Some((entry, warnings))) => pending.push((entry, warnings)),
                Ok(None) => {}
                Err(outcome) => outcomes.push(*outcome),
            }
        }

        // Phase 2: import, one external invocation at a time
        let total = pending.len();
        for (attempted, (entry, warnings)) in pending.into_iter().enumerate() {
            let prefix = format!("[{}/{}]", attempted + 1, total);
            outcomes.push(self.import_one(&prefix, entry, warnings));
        }

        // Back to export order
        outcomes.sort_by(|a, b| a.source_path.cmp(&b.source_path));

        let summary = ImportSummary {
            run_id: self.run_id.clone(),
            dry_run: self.importer.is_dry_run(),
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };

        if let Err(e) = ledger::record_run(self.conn, &summary.to_run_record(&self.journal)) {
            error!("failed to record run {} in ledger: {}", self.run_id, e);
        }

        summary
    }

    /// Validated entry ready to import, or the final outcome for this file
    #[allow(clippy::type_complexity)]
    fn prepare(
        &self,
        raw: &crate::export::ExportEntry,
        seen: &mut HashSet<String>,
    ) -> Result<Option<(ValidatedEntry, Vec<String>)>, Box<EntryOutcome>> {
        let source_id = raw.source_id().map(str::to_string);
        let finish = |outcome: Outcome, warnings: Vec<String>| {
            Box::new(EntryOutcome {
                source_path: raw.path.clone(),
                source_id: source_id.clone(),
                outcome,
                warnings,
            })
        };

        let report = match self.validator.validate(raw) {
            Ok(report) => report,
            Err(err) => {
                error!("{}", err);
                return Err(finish(Outcome::failed(&err), Vec::new()));
            }
        };

        let id = source_id.clone().unwrap_or_default();

        if !seen.insert(id.clone()) {
            warn!("duplicate id in export, skipping: id={}", id);
            return Err(finish(
                Outcome::Skipped {
                    reason: "duplicate id in export".to_string(),
                },
                report.warnings,
            ));
        }

        // Already imported: the warnings were reported on the run that imported it
        match ledger::get_import(self.conn, &id) {
            Ok(Some(record)) => {
                let mut warnings = Vec::new();
                if let Validation::Valid(entry) = &report.validation {
                    if entry.content_hash != record.content_hash {
                        let message = format!("entry changed since it was imported: id={}", id);
                        warn!("{}", message);
                        warnings.push(message);
                    }
                }
                debug!(id = %id, target = %record.target_id, "already imported");
                return Err(finish(
                    Outcome::Skipped {
                        reason: format!("already imported as {}", record.target_id),
                    },
                    warnings,
                ));
            }
            Ok(None) => {}
            Err(e) => {
                let err = EntryError::Ledger(e);
                error!("{}", err);
                return Err(finish(Outcome::failed(&err), report.warnings));
            }
        }

        for message in &report.warnings {
            warn!("{}", message);
        }

        match report.validation {
            Validation::Valid(entry) => Ok(Some((entry, report.warnings))),
            Validation::Skip { reason } => {
                warn!("{}, skipping: id={}", reason, id);
                Err(finish(Outcome::Skipped { reason }, report.warnings))
            }
        }
    }

    fn import_one(&mut self, prefix: &str, entry: ValidatedEntry, warnings: Vec<String>) -> EntryOutcome {
        let source_path = entry.source_path.clone();
        let source_id = Some(entry.foreign_id.clone());

        debug!(importer = self.importer.name(), id = %entry.foreign_id, "importing");
        let result = self.importer.import(&entry).and_then(|target_id| {
            if !self.importer.is_dry_run() {
                let record = LedgerRecord {
                    source_id: entry.foreign_id.clone(),
                    target_id: target_id.clone(),
                    source_path: entry.source_path.display().to_string(),
                    content_hash: entry.content_hash.clone(),
                    run_id: self.run_id.clone(),
                    imported_at: Utc::now(),
                };
                ledger::record_import(self.conn, &record)?;
            }
            Ok(target_id)
        });

        let outcome = match result {
            Ok(target_id) => {
                let details = entry.describe();
                if details.is_empty() {
                    println!("{} Added new: {} -> {}", prefix, entry.foreign_id, target_id);
                } else {
                    println!(
                        "{} Added new: {} -> {}: {}",
                        prefix, entry.foreign_id, target_id, details
                    );
                }
                Outcome::Imported { target_id }
            }
            Err(err) => {
                error!("{} failed for {}: {}", self.importer.name(), entry.foreign_id, err);
                Outcome::failed(&err)
            }
        };

        EntryOutcome {
            source_path,
            source_id,
            outcome,
            warnings,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::MarkdownConverter;
    use chrono_tz::Tz;
    use std::fs;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    /// Log sink for asserting on emitted events
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Records every entry it is asked to import
    struct RecordingImporter {
        imported: Vec<String>,
        fail_ids: Vec<String>,
    }

    impl RecordingImporter {
        fn new() -> Self {
            RecordingImporter {
                imported: Vec::new(),
                fail_ids: Vec::new(),
            }
        }
    }

    impl EntryImporter for RecordingImporter {
        fn import(&mut self, entry: &ValidatedEntry) -> Result<String, EntryError> {
            if self.fail_ids.contains(&entry.foreign_id) {
                return Err(EntryError::ImporterFailed {
                    status: "exit status: 1".to_string(),
                    stderr: "boom".to_string(),
                });
            }
            self.imported.push(entry.foreign_id.clone());
            Ok(format!("T{}", self.imported.len()))
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn ledger_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        ledger::setup_ledger(&conn).unwrap();
        conn
    }

    fn validator(root: &Path) -> EntryValidator {
        EntryValidator::new(root, MarkdownConverter::default()).with_fallback_timezone(Tz::UTC)
    }

    fn write_entry(dir: &Path, name: &str, json: &str) {
        fs::write(dir.join(name), json).unwrap();
    }

    #[test]
    fn test_counts_each_outcome() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), "a.json", r#"{"id": "a", "text": "<p>one</p>"}"#);
        write_entry(dir.path(), "b.json", r#"{"id": "b", "text": ""}"#);
        write_entry(dir.path(), "c.json", "{broken");
        write_entry(dir.path(), "d.json", r#"{"id": "d", "text": "fails"}"#);

        let conn = ledger_conn();
        let mut importer = RecordingImporter::new();
        importer.fail_ids.push("d".to_string());

        let summary = ImportRun::new(&conn, &mut importer, validator(dir.path()), "J").run(dir.path());

        assert_eq!(summary.tally_line(), "1 succeeded, 2 failed, 1 skipped");
        assert_eq!(summary.skipped_paths(), vec![dir.path().join("b.json").as_path()]);
        assert_eq!(ledger::verify_count(&conn).unwrap(), 1);
        assert_eq!(ledger::get_runs(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_failures_are_logged_as_errors() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), "c.json", "{broken");
        write_entry(dir.path(), "d.json", r#"{"id": "d", "text": "fails"}"#);

        let conn = ledger_conn();
        let mut importer = RecordingImporter::new();
        importer.fail_ids.push("d".to_string());

        let logs = CapturedLogs::default();
        let sink = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .finish();

        let summary = tracing::subscriber::with_default(subscriber, || {
            ImportRun::new(&conn, &mut importer, validator(dir.path()), "J").run(dir.path())
        });

        assert_eq!(summary.failed(), 2);
        let output = logs.contents();
        let error_lines: Vec<&str> = output.lines().filter(|l| l.contains("ERROR")).collect();
        assert_eq!(error_lines.len(), 2);
        assert!(error_lines[0].contains("failed to parse"));
        assert!(error_lines[1].contains("recording failed for d: importer exited with exit status: 1: boom"));
    }

    #[test]
    fn test_run_id_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), "a.json", r#"{"id": "a", "text": "one"}"#);

        let conn = ledger_conn();
        let mut importer = RecordingImporter::new();
        let mut run = ImportRun::new(&conn, &mut importer, validator(dir.path()), "J");
        let run_id = run.run_id().to_string();
        let summary = run.run(dir.path());

        assert_eq!(summary.run_id, run_id);
        assert_eq!(ledger::get_runs(&conn).unwrap()[0].run_id, run_id);
        assert_eq!(ledger::get_import(&conn, "a").unwrap().unwrap().run_id, run_id);
    }

    #[test]
    fn test_rerun_skips_imported_entries() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), "a.json", r#"{"id": "a", "text": "one"}"#);
        write_entry(dir.path(), "b.json", r#"{"id": "b", "text": "two"}"#);

        let conn = ledger_conn();

        let mut first = RecordingImporter::new();
        let summary1 = ImportRun::new(&conn, &mut first, validator(dir.path()), "J").run(dir.path());

        let mut second = RecordingImporter::new();
        let summary2 = ImportRun::new(&conn, &mut second, validator(dir.path()), "J").run(dir.path());

        assert_eq!(summary1.succeeded(), 2);
        assert_eq!(summary2.succeeded(), 0);
        assert_eq!(summary2.skipped(), 2);
        assert!(second.imported.is_empty());
    }

    #[test]
    fn test_changed_entry_is_skipped_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), "a.json", r#"{"id": "a", "text": "one"}"#);

        let conn = ledger_conn();
        let mut first = RecordingImporter::new();
        ImportRun::new(&conn, &mut first, validator(dir.path()), "J").run(dir.path());

        write_entry(dir.path(), "a.json", r#"{"id": "a", "text": "one, edited"}"#);
        let mut second = RecordingImporter::new();
        let summary = ImportRun::new(&conn, &mut second, validator(dir.path()), "J").run(dir.path());

        assert_eq!(summary.skipped(), 1);
        assert!(summary.outcomes[0].warnings[0].contains("changed since it was imported"));
        assert!(second.imported.is_empty());
    }

    #[test]
    fn test_duplicate_id_within_run() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), "a.json", r#"{"id": "same", "text": "one"}"#);
        write_entry(dir.path(), "b.json", r#"{"id": "same", "text": "two"}"#);

        let conn = ledger_conn();
        let mut importer = RecordingImporter::new();
        let summary = ImportRun::new(&conn, &mut importer, validator(dir.path()), "J").run(dir.path());

        assert_eq!(summary.tally_line(), "1 succeeded, 0 failed, 1 skipped");
        assert_eq!(importer.imported, vec!["same"]);
    }

    #[test]
    fn test_failed_import_is_retried_next_run() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), "a.json", r#"{"id": "a", "text": "one"}"#);

        let conn = ledger_conn();
        let mut failing = RecordingImporter::new();
        failing.fail_ids.push("a".to_string());
        let summary1 = ImportRun::new(&conn, &mut failing, validator(dir.path()), "J").run(dir.path());

        let mut working = RecordingImporter::new();
        let summary2 = ImportRun::new(&conn, &mut working, validator(dir.path()), "J").run(dir.path());

        assert_eq!(summary1.failed(), 1);
        assert_eq!(summary2.succeeded(), 1);
        assert_eq!(working.imported, vec!["a"]);
    }

    #[test]
    fn test_invalid_coordinates_do_not_fail_entry() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(
            dir.path(),
            "a.json",
            r#"{"id": "a", "text": "here", "lat": 1.7976931348623157e308, "lon": 1.7976931348623157e308}"#,
        );

        let conn = ledger_conn();
        let mut importer = RecordingImporter::new();
        let summary = ImportRun::new(&conn, &mut importer, validator(dir.path()), "J").run(dir.path());

        assert_eq!(summary.succeeded(), 1);
        assert!(summary.outcomes[0].warnings[0].starts_with("coordinates are invalid"));
    }
}
