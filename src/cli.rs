use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Top-level CLI parser for the `journal-bridge` binary.
#[derive(Debug, Parser)]
#[command(
    name = "journal-bridge",
    version,
    about = "Import an exported journal into Day One"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import every entry of an export directory into a journal
    Import(ImportArgs),

    /// Print the Markdown for one HTML file
    Convert(ConvertArgs),

    /// List what the ledger has recorded for an export directory
    Ledger(LedgerArgs),
}

#[derive(Debug, clap::Args)]
pub struct ImportArgs {
    /// Target journal name
    pub journal: String,

    /// Directory holding the exported entry files
    pub export_dir: PathBuf,

    /// Ledger file (default: inside the export directory)
    #[arg(long)]
    pub ledger: Option<PathBuf>,

    /// JSON rules file (rewrites and name fixes)
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Write a per-entry CSV report here
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Show what would be imported without invoking the importer
    #[arg(long)]
    pub dry_run: bool,

    /// Rewrite <a href> links as Markdown links
    #[arg(long)]
    pub convert_links: bool,

    /// Importer executable
    #[arg(long)]
    pub importer: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct ConvertArgs {
    pub html_file: PathBuf,

    #[arg(long)]
    pub rules: Option<PathBuf>,

    #[arg(long)]
    pub convert_links: bool,
}

#[derive(Debug, clap::Args)]
pub struct LedgerArgs {
    pub export_dir: PathBuf,

    #[arg(long)]
    pub ledger: Option<PathBuf>,
}
