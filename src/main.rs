mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::info;

use cli::{Cli, Commands, ConvertArgs, ImportArgs, LedgerArgs};
use journal_bridge::{
    get_all_imports, get_importer, get_runs, open_ledger, write_report, BridgeConfig,
    EntryValidator, ImportRun, MarkdownConverter, RuleSet,
};

fn main() {
    if let Err(error) = run() {
        eprintln!("journal-bridge error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let config = BridgeConfig::load().context("failed to load configuration")?;

    match cli.command {
        Commands::Import(args) => run_import(&config, args),
        Commands::Convert(args) => run_convert(&config, args),
        Commands::Ledger(args) => run_ledger(&config, args),
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("JOURNAL_BRIDGE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

/// `--rules` wins over the configured rules file; no file means no rules
fn load_converter(config: &BridgeConfig, rules: Option<&Path>, convert_links: bool) -> Result<MarkdownConverter> {
    let rules_path = rules.or(config.markup.rules_file.as_deref());
    let rules = match rules_path {
        Some(path) => RuleSet::from_file(path)?,
        None => RuleSet::new(),
    };

    Ok(MarkdownConverter::new(rules).with_links(convert_links || config.markup.convert_links))
}

fn require_export_dir(export_dir: &Path) -> Result<()> {
    if !export_dir.is_dir() {
        bail!("export directory not found: {}", export_dir.display());
    }
    Ok(())
}

fn run_import(config: &BridgeConfig, args: ImportArgs) -> Result<()> {
    require_export_dir(&args.export_dir)?;

    let converter = load_converter(config, args.rules.as_deref(), args.convert_links)?;
    let validator = EntryValidator::new(&args.export_dir, converter)
        .with_timestamp_format(&config.importer.timestamp_format);

    let ledger_path = config.ledger_path(&args.export_dir, args.ledger.as_deref());
    let conn = open_ledger(&ledger_path)?;

    let binary = args.importer.as_deref().unwrap_or(&config.importer.binary);
    let mut importer = get_importer(binary, &args.journal, args.dry_run);

    if args.dry_run {
        println!("Dry run: nothing will be written to '{}'", args.journal);
    }

    let mut import_run = ImportRun::new(&conn, importer.as_mut(), validator, &args.journal);
    info!(
        run_id = import_run.run_id(),
        importer = binary,
        ledger = %ledger_path.display(),
        "starting import"
    );
    let summary = import_run.run(&args.export_dir);
    summary.print_result();

    if let Some(report_path) = &args.report {
        write_report(report_path, &summary.outcomes)?;
        println!("Report written to {}", report_path.display());
    }

    Ok(())
}

fn run_convert(config: &BridgeConfig, args: ConvertArgs) -> Result<()> {
    let converter = load_converter(config, args.rules.as_deref(), args.convert_links)?;
    let html = std::fs::read_to_string(&args.html_file)
        .with_context(|| format!("Failed to read {}", args.html_file.display()))?;

    println!("{}", converter.convert(&html));
    Ok(())
}

fn run_ledger(config: &BridgeConfig, args: LedgerArgs) -> Result<()> {
    require_export_dir(&args.export_dir)?;

    let ledger_path = config.ledger_path(&args.export_dir, args.ledger.as_deref());
    if !ledger_path.exists() {
        bail!("no ledger at {}", ledger_path.display());
    }
    let conn = open_ledger(&ledger_path)?;

    let imports = get_all_imports(&conn)?;
    println!("📒 {} imported entries", imports.len());
    for record in &imports {
        println!(
            "  {} -> {}  ({}, {})",
            record.source_id,
            record.target_id,
            record.imported_at.format("%Y-%m-%d %H:%M:%S"),
            record.source_path
        );
    }

    let runs = get_runs(&conn)?;
    println!("\n🕑 {} runs", runs.len());
    for run in &runs {
        println!(
            "  {}  {}  journal={}  {} succeeded, {} failed, {} skipped{}",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.run_id,
            run.journal,
            run.succeeded,
            run.failed,
            run.skipped,
            if run.dry_run { "  (dry run)" } else { "" }
        );
    }

    Ok(())
}
