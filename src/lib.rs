// Journal Bridge - Core Library
// Exposes all modules for use in the CLI and tests

pub mod config;
pub mod error;
pub mod export;
pub mod importer;
pub mod ledger;
pub mod markup;
pub mod pipeline;
pub mod report;
pub mod rules;
pub mod validate;

// Re-export commonly used types
pub use config::{BridgeConfig, ConfigError};
pub use error::EntryError;
pub use export::{ExportEntry, iter_export_files, load_entries, load_entry, parse_entry};
pub use importer::{DayOneCli, DryRun, EntryImporter, get_importer};
pub use ledger::{
    LedgerRecord, RunRecord,
    open_ledger, setup_ledger, is_imported, get_import, record_import,
    get_all_imports, verify_count, record_run, get_runs,
};
pub use markup::{MarkdownConverter, html_to_markdown};
pub use pipeline::{EntryOutcome, ImportRun, ImportSummary, Outcome};
pub use report::write_report;
pub use rules::{NameFix, RewriteRule, RuleFile, RuleSet};
pub use validate::{
    Coordinates, EntryValidator, ValidatedEntry, Validation, ValidationReport,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
