// 🧾 Run Report - per-entry outcomes as CSV
// One row per export file, written after the run finishes.

use crate::pipeline::{EntryOutcome, Outcome};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

pub const REPORT_HEADER: [&str; 6] = [
    "source_path",
    "source_id",
    "outcome",
    "target_id",
    "detail",
    "warnings",
];

/// Write the report to a file
pub fn write_report(path: &Path, outcomes: &[EntryOutcome]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report: {}", path.display()))?;
    write_report_to(file, outcomes)
        .with_context(|| format!("Failed to write report: {}", path.display()))
}

pub fn write_report_to<W: Write>(writer: W, outcomes: &[EntryOutcome]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(REPORT_HEADER)?;

    for entry in outcomes {
        let (target_id, detail) = match &entry.outcome {
            Outcome::Imported { target_id } => (target_id.as_str(), String::new()),
            Outcome::Skipped { reason } => ("", reason.clone()),
            Outcome::Failed { kind, error } => ("", format!("{}: {}", kind, error)),
        };

        wtr.write_record([
            entry.source_path.display().to_string().as_str(),
            entry.source_id.as_deref().unwrap_or(""),
            entry.outcome.label(),
            target_id,
            detail.as_str(),
            entry.warnings.join("; ").as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn outcome(name: &str, outcome: Outcome, warnings: &[&str]) -> EntryOutcome {
        EntryOutcome {
            source_path: PathBuf::from(format!("/export/{}.json", name)),
            source_id: Some(name.to_string()),
            outcome,
            warnings: warnings.iter().map(|w| w.to_string()).collect(),
        }
    }

    #[test]
    fn test_report_rows() {
        let outcomes = vec![
            outcome(
                "a",
                Outcome::Imported {
                    target_id: "CB17".to_string(),
                },
                &["timezone is invalid: X", "photo path is invalid: p.jpg"],
            ),
            outcome(
                "b",
                Outcome::Skipped {
                    reason: "entry has no text and no photos".to_string(),
                },
                &[],
            ),
            outcome(
                "c",
                Outcome::Failed {
                    kind: "importer_failed".to_string(),
                    error: "exit status: 1".to_string(),
                },
                &[],
            ),
        ];

        let mut buf = Vec::new();
        write_report_to(&mut buf, &outcomes).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(
            text,
            "source_path,source_id,outcome,target_id,detail,warnings\n\
             /export/a.json,a,imported,CB17,,timezone is invalid: X; photo path is invalid: p.jpg\n\
             /export/b.json,b,skipped,,entry has no text and no photos,\n\
             /export/c.json,c,failed,,importer_failed: exit status: 1,\n"
        );
    }

    #[test]
    fn test_write_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");

        write_report(&path, &[]).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = rdr.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, REPORT_HEADER);
        assert_eq!(rdr.records().count(), 0);
    }
}
