// 📥 Importer - hands one validated entry to the target journal app
// The external CLI is an opaque collaborator: Markdown on stdin, metadata as
// flags, exit status for success, entry id on stdout.

use crate::error::EntryError;
use crate::validate::ValidatedEntry;
use regex::Regex;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use tracing::{debug, info};

/// e.g. "Created new entry with uuid: CB17A357BED34F6D838410CA96C7D9D1"
static TRAILING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-F0-9]+)\s*$").expect("id pattern is valid"));

// ============================================================================
// IMPORTER TRAIT
// ============================================================================

/// EntryImporter - creates one entry in the target journal
///
/// Returns the identifier the target app assigned (may be empty when the
/// importer does not report one).
pub trait EntryImporter {
    fn import(&mut self, entry: &ValidatedEntry) -> Result<String, EntryError>;

    /// Short name for logs
    fn name(&self) -> &str;

    /// Dry runs must not be recorded in the ledger
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Pick the importer for this run
pub fn get_importer(binary: &str, journal: &str, dry_run: bool) -> Box<dyn EntryImporter> {
    let cli = DayOneCli::new(binary, journal);
    if dry_run {
        Box::new(DryRun::new(cli))
    } else {
        Box::new(cli)
    }
}

// ============================================================================
// DAY ONE CLI
// ============================================================================

pub struct DayOneCli {
    binary: String,
    journal: String,
}

impl DayOneCli {
    pub fn new(binary: &str, journal: &str) -> Self {
        DayOneCli {
            binary: binary.to_string(),
            journal: journal.to_string(),
        }
    }

    /// Arguments after the binary name
    pub fn build_args(&self, entry: &ValidatedEntry) -> Vec<String> {
        let mut args = vec![
            "-j".to_string(),
            self.journal.clone(),
            "-d".to_string(),
            entry.timestamp.clone(),
            "-z".to_string(),
            entry.timezone.clone(),
        ];

        if !entry.tags.is_empty() {
            args.push("-t".to_string());
            args.extend(entry.tags.iter().cloned());
        }

        if !entry.photos.is_empty() {
            args.push("-p".to_string());
            args.extend(entry.photos.iter().map(|p| p.display().to_string()));
        }

        if let Some(coords) = entry.coordinates {
            args.push("--coordinate".to_string());
            args.push(coords.lat.to_string());
            args.push(coords.lon.to_string());
        }

        args.push("--".to_string());
        args.push("new".to_string());
        args
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }
}

impl EntryImporter for DayOneCli {
    fn import(&mut self, entry: &ValidatedEntry) -> Result<String, EntryError> {
        let args = self.build_args(entry);
        debug!(binary = %self.binary, ?args, "running importer");

        let spawn_error = |source| EntryError::ImporterSpawn {
            binary: self.binary.clone(),
            source,
        };

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        if let Some(mut stdin) = child.stdin.take() {
            // An importer that exits without reading stdin is judged by its status
            match stdin.write_all(entry.text.as_bytes()) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(e) => return Err(spawn_error(e)),
            }
        }

        let output = child.wait_with_output().map_err(spawn_error)?;

        if output.status.success() {
            Ok(parse_id_from_output(&String::from_utf8_lossy(&output.stdout)))
        } else {
            Err(EntryError::ImporterFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn name(&self) -> &str {
        &self.binary
    }
}

/// Trailing uppercase-hex token of the importer's stdout, empty if none
pub fn parse_id_from_output(output: &str) -> String {
    TRAILING_ID
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

// ============================================================================
// DRY RUN
// ============================================================================

/// Logs what would be run; nothing reaches the target journal
pub struct DryRun {
    cli: DayOneCli,
    count: usize,
}

impl DryRun {
    pub fn new(cli: DayOneCli) -> Self {
        DryRun { cli, count: 0 }
    }
}

impl EntryImporter for DryRun {
    fn import(&mut self, entry: &ValidatedEntry) -> Result<String, EntryError> {
        self.count += 1;
        let args = self.cli.build_args(entry);
        info!(importer = self.name(), binary = %self.cli.binary(), ?args, "importer not invoked");
        Ok(format!("dry-run-{}", self.count))
    }

    fn name(&self) -> &str {
        "dry-run"
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

// ============================================================================
// TESTS
// ============================================================================
