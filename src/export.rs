// 📂 Export Reader - per-entry JSON files from the source journal app
// One file per entry; the HTML body lives in the `text` field

use crate::error::EntryError;
use ignore::WalkBuilder;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ============================================================================
// CORE TYPES
// ============================================================================

/// ExportEntry - one entry exactly as the source app wrote it
/// Everything except `id` is optional in practice, so missing fields default
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportEntry {
    #[serde(default)]
    pub id: Option<String>,

    /// Epoch milliseconds
    #[serde(default)]
    pub date_journal: Option<f64>,

    /// HTML body
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,

    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    pub entry_type: String,

    #[serde(default)]
    pub lat: Option<f64>,

    #[serde(default)]
    pub lon: Option<f64>,

    /// IANA zone name, e.g. "Europe/Amsterdam"
    #[serde(default, deserialize_with = "null_as_default")]
    pub timezone: String,

    /// Free-form place name; informational only, coordinates carry the location
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,

    /// Relative to the export root
    #[serde(default, deserialize_with = "null_as_default")]
    pub photos: Vec<String>,

    /// File this entry was loaded from (not part of the export format)
    #[serde(skip)]
    pub path: PathBuf,
}

/// Exports write `null` for absent values as often as they omit the key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ExportEntry {
    /// Stable source id, `None` when missing or blank
    pub fn source_id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }
}

// ============================================================================
// DIRECTORY WALK
// ============================================================================

/// List every `*.json` file under `root`, recursively, sorted by path
///
/// Hidden files are included and ignore files are not honoured: an export
/// directory is not a source tree.
pub fn iter_export_files(root: &Path) -> Vec<PathBuf> {
    let mut builder = WalkBuilder::new(root);
    builder.standard_filters(false);

    let mut files: Vec<PathBuf> = builder
        .build()
        .filter_map(|result| match result {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skipping unreadable path in export: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| is_json_file(path))
        .collect();

    files.sort();
    debug!(count = files.len(), root = %root.display(), "found export files");
    files
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

// ============================================================================
// LOADING
// ============================================================================

/// Read and deserialize one export file
pub fn load_entry(path: &Path) -> Result<ExportEntry, EntryError> {
    let content = fs::read_to_string(path).map_err(|source| EntryError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_entry(&content, path)
}

/// Deserialize entry JSON, tagging it with the path it came from
pub fn parse_entry(content: &str, path: &Path) -> Result<ExportEntry, EntryError> {
    let mut entry: ExportEntry =
        serde_json::from_str(content).map_err(|source| EntryError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    if entry.source_id().is_none() {
        return Err(EntryError::MissingId {
            path: path.to_path_buf(),
        });
    }

    entry.path = path.to_path_buf();
    Ok(entry)
}

/// Load every entry under `root`; failures stay attached to their path
pub fn load_entries(root: &Path) -> Vec<(PathBuf, Result<ExportEntry, EntryError>)> {
    iter_export_files(root)
        .into_iter()
        .map(|path| {
            let result = load_entry(&path);
            (path, result)
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
