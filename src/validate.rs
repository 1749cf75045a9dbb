// ✅ Entry Validation - raw export entry → importable entry
// Bad fields degrade to warnings; only "nothing to import" skips an entry.
// Warnings are returned, not logged: the caller decides whether they matter.

use crate::error::EntryError;
use crate::export::ExportEntry;
use crate::markup::MarkdownConverter;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Timestamp format the importer's `-d` flag understands
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %I:%M:%S %p";

/// Marker the target app writes into entries it exported itself
const TARGET_APP_MARKER: &str = "dayone-moment:";

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

// ============================================================================
// CORE TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// ValidatedEntry - everything the importer needs, already normalized
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedEntry {
    pub foreign_id: String,
    pub source_path: PathBuf,

    /// Markdown body
    pub text: String,

    /// Whitespace already backslash-escaped
    pub tags: Vec<String>,

    /// Absolute paths to existing files
    pub photos: Vec<PathBuf>,

    pub coordinates: Option<Coordinates>,

    /// Rendered in `timezone` with the configured format
    pub timestamp: String,
    pub timezone: String,

    /// SHA-256 over the imported content, for change detection
    pub content_hash: String,
}

impl ValidatedEntry {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// "12 words, 2 tags, 1 photos" (zero parts omitted)
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.word_count() > 0 {
            parts.push(format!("{} words", self.word_count()));
        }
        if !self.tags.is_empty() {
            parts.push(format!("{} tags", self.tags.len()));
        }
        if !self.photos.is_empty() {
            parts.push(format!("{} photos", self.photos.len()));
        }
        parts.join(", ")
    }
}

/// Result of validating one entry
#[derive(Debug, Clone)]
pub enum Validation {
    Valid(ValidatedEntry),
    Skip { reason: String },
}

/// Validated entry or skip decision, plus the warnings raised on the way
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub validation: Validation,
    pub warnings: Vec<String>,
}

// ============================================================================
// VALIDATOR
// ============================================================================

pub struct EntryValidator {
    /// Photo paths are relative to this
    export_root: PathBuf,
    converter: MarkdownConverter,
    timestamp_format: String,
    /// Used when the entry's own zone is missing or unknown
    fallback_timezone: Tz,
    /// Used when the entry's own timestamp is missing or out of range
    now: DateTime<Utc>,
}

impl EntryValidator {
    pub fn new(export_root: &Path, converter: MarkdownConverter) -> Self {
        EntryValidator {
            export_root: export_root.to_path_buf(),
            converter,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            fallback_timezone: local_timezone(),
            now: Utc::now(),
        }
    }

    /// Builder pattern: override the timestamp format
    pub fn with_timestamp_format(mut self, format: &str) -> Self {
        self.timestamp_format = format.to_string();
        self
    }

    /// Builder pattern: override the fallback zone
    pub fn with_fallback_timezone(mut self, tz: Tz) -> Self {
        self.fallback_timezone = tz;
        self
    }

    /// Builder pattern: pin "now" (fallback timestamp)
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Validate one raw entry
    pub fn validate(&self, raw: &ExportEntry) -> Result<ValidationReport, EntryError> {
        let foreign_id = raw
            .source_id()
            .ok_or_else(|| EntryError::MissingId {
                path: raw.path.clone(),
            })?
            .to_string();
        let mut warnings = Vec::new();

        let tz = match self.resolve_timezone(&raw.timezone) {
            Ok(tz) => tz,
            Err(message) => {
                warnings.push(message);
                self.fallback_timezone
            }
        };

        let timestamp = match self.render_timestamp(raw.date_journal, tz) {
            Ok(ts) => ts,
            Err(message) => {
                warnings.push(message);
                self.now.with_timezone(&tz).format(&self.timestamp_format).to_string()
            }
        };

        let mut photos = Vec::new();
        for photo in &raw.photos {
            match self.resolve_photo(photo) {
                Ok(path) => photos.push(path),
                Err(message) => warnings.push(message),
            }
        }

        let tags: Vec<String> = raw
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(escape_tag)
            .collect();

        let coordinates = match check_coordinates(raw.lat, raw.lon) {
            Ok(coords) => coords,
            Err(message) => {
                warnings.push(message);
                None
            }
        };

        let text = self.converter.convert(&raw.text);
        let has_text = !text.trim().is_empty();

        if !has_text {
            warnings.push(format!("entry has no text: id={}", foreign_id));
        }

        if !has_text && photos.is_empty() {
            return Ok(ValidationReport {
                validation: Validation::Skip {
                    reason: "entry has no text and no photos".to_string(),
                },
                warnings,
            });
        }

        if text.contains(TARGET_APP_MARKER) {
            return Ok(ValidationReport {
                validation: Validation::Skip {
                    reason: "entry was previously exported from the target journal".to_string(),
                },
                warnings,
            });
        }

        let timezone = tz.name().to_string();
        // Exported values only, never what was resolved from them
        let date_key = raw.date_journal.map(|d| d.to_string()).unwrap_or_default();
        let content_hash =
            compute_content_hash(&text, &date_key, raw.timezone.trim(), &tags, &raw.photos);

        Ok(ValidationReport {
            validation: Validation::Valid(ValidatedEntry {
                foreign_id,
                source_path: raw.path.clone(),
                text,
                tags,
                photos,
                coordinates,
                timestamp,
                timezone,
                content_hash,
            }),
            warnings,
        })
    }

    /// Empty zone is not an error; an unknown one is
    fn resolve_timezone(&self, name: &str) -> Result<Tz, String> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(self.fallback_timezone);
        }
        name.parse::<Tz>()
            .map_err(|_| format!("timezone is invalid: {}", name))
    }

    fn render_timestamp(&self, date_journal: Option<f64>, tz: Tz) -> Result<String, String> {
        let Some(millis) = date_journal else {
            return Ok(self.now.with_timezone(&tz).format(&self.timestamp_format).to_string());
        };

        let in_range = millis.is_finite() && millis.abs() < i64::MAX as f64;
        let dt = in_range
            .then(|| DateTime::<Utc>::from_timestamp_millis(millis as i64))
            .flatten()
            .ok_or_else(|| format!("timestamp is invalid: {}", millis))?;

        Ok(dt.with_timezone(&tz).format(&self.timestamp_format).to_string())
    }

    fn resolve_photo(&self, relative: &str) -> Result<PathBuf, String> {
        let joined = self.export_root.join(relative);
        let path = std::path::absolute(&joined).unwrap_or(joined);

        if path.is_file() {
            Ok(path)
        } else {
            Err(format!("photo path is invalid: {}", path.display()))
        }
    }
}

// ============================================================================
// FIELD HELPERS
// ============================================================================

/// Zone of this machine, UTC if it cannot be determined
pub fn local_timezone() -> Tz {
    iana_time_zone::get_timezone()
        .ok()
        .and_then(|name| name.parse::<Tz>().ok())
        .unwrap_or(Tz::UTC)
}

/// Backslash before every whitespace run: "new york" → "new\ york"
pub fn escape_tag(raw: &str) -> String {
    WHITESPACE.replace_all(raw, "\\${0}").into_owned()
}

/// `Ok(None)` when absent or (0, 0); `Err` for out-of-range / sentinel values
pub fn check_coordinates(lat: Option<f64>, lon: Option<f64>) -> Result<Option<Coordinates>, String> {
    let (Some(lat), Some(lon)) = (lat, lon) else {
        return Ok(None);
    };

    let lat_valid = lat.is_finite() && lat.abs() <= 90.0;
    let lon_valid = lon.is_finite() && lon.abs() <= 180.0;

    if !lat_valid || !lon_valid {
        return Err(format!("coordinates are invalid: {} {}", lat, lon));
    }

    if lat == 0.0 && lon == 0.0 {
        return Ok(None);
    }

    Ok(Some(Coordinates { lat, lon }))
}

/// Hash of the entry's content as exported
///
/// `photos` are the names relative to the export root.
pub fn compute_content_hash(
    text: &str,
    date_key: &str,
    timezone: &str,
    tags: &[String],
    photos: &[String],
) -> String {
    let mut hasher = Sha256::new();
    for part in [text, date_key, timezone] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    for tag in tags {
        hasher.update(tag.as_bytes());
        hasher.update([0x1e]);
    }
    for photo in photos {
        hasher.update(photo.as_bytes());
        hasher.update([0x1e]);
    }
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// TESTS
// ============================================================================
