use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use bidsify::discover::discover_sources;
use bidsify::report::{RelocationSummary, RunReport, ScanSummary};
use bidsify::table::{self, FOLDER_PATHS_FILE, RELOCATION_TABLE_FILE, SCAN_TABLE_FILE};
use bidsify::{Relocator, scanner};

#[derive(Parser)]
#[command(name = "bidsify")]
#[command(about = "Extract NIFTI sidecar metadata and relocate scans into a BIDS tree")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Draw a progress bar while processing
    #[arg(long, global = true)]
    progress: bool,

    /// Write a JSON run report to this file
    #[arg(long, global = true, value_name = "FILE")]
    report: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// List source folders (folders holding a `nii` directory) under a study tree
    Discover(DiscoverArgs),
    /// Read each source folder's sidecar into the scan table
    Scan(ScanArgs),
    /// Copy scans into the BIDS tree and correct their task names
    Relocate(RelocateArgs),
}

#[derive(Args)]
struct DiscoverArgs {
    /// Study root to walk
    #[arg(long, env = "BIDSIFY_STUDY_ROOT")]
    root: PathBuf,

    /// Folder list to write
    #[arg(short, long, default_value = FOLDER_PATHS_FILE)]
    output: PathBuf,

    /// Maximum recursion depth below the study root
    #[arg(long, default_value = "10")]
    max_depth: usize,
}

#[derive(Args)]
struct ScanArgs {
    /// Folder list (tab-separated, one header line)
    #[arg(short, long, default_value = FOLDER_PATHS_FILE)]
    input: PathBuf,

    /// Scan table to write
    #[arg(short, long, default_value = SCAN_TABLE_FILE)]
    output: PathBuf,

    /// Replaces the leading `.` of every listed folder
    #[arg(long, env = "BIDSIFY_STUDY_ROOT")]
    study_root: Option<String>,
}

#[derive(Args)]
struct RelocateArgs {
    /// Relocation table with path, BIDS_path and jsonTaskName columns
    #[arg(short, long, default_value = RELOCATION_TABLE_FILE)]
    input: PathBuf,

    /// Root of the BIDS tree
    #[arg(long, env = "BIDSIFY_BIDS_ROOT")]
    bids_root: PathBuf,

    /// Pretty print patched sidecars
    #[arg(short, long)]
    pretty: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    match &cli.command {
        Command::Discover(args) => run_discover(&cli, args),
        Command::Scan(args) => run_scan(&cli, args),
        Command::Relocate(args) => run_relocate(&cli, args),
    }
}

fn run_discover(cli: &Cli, args: &DiscoverArgs) -> Result<()> {
    let folders = discover_sources(&args.root, args.max_depth)
        .with_context(|| format!("Failed to walk study root: {:?}", args.root))?;

    if folders.is_empty() {
        bail!("No source folders with a nii directory under {:?}", args.root);
    }

    table::write_folder_paths(&args.output, &folders)?;
    log::info!("Wrote {} source folders to {:?}", folders.len(), args.output);

    if cli.verbose > 0 {
        println!("Found {} source folders", folders.len());
    }
    Ok(())
}

fn run_scan(cli: &Cli, args: &ScanArgs) -> Result<()> {
    let mut paths = table::read_folder_paths(&args.input)
        .with_context(|| format!("Failed to read folder list: {:?}", args.input))?;
    if let Some(root) = &args.study_root {
        for path in paths.iter_mut() {
            *path = table::rewrite_root(path, root);
        }
    }

    log::info!("Scanning {} source folders", paths.len());
    let progress_bar = make_progress_bar(cli, paths.len())?;
    let records = scanner::scan_all(&paths, progress_bar.as_ref())?;
    if let Some(pb) = &progress_bar {
        pb.finish_with_message("scan complete");
    }

    table::write_scan_table(&args.output, &records)?;
    log::info!("Scan table saved to {:?}", args.output);

    let summary = ScanSummary::from_records(&records);
    if cli.verbose > 0 {
        println!("\nScan Summary:");
        println!("   Source folders: {}", records.len());
        println!("   Extracted: {}", summary.extracted);
        println!("   Sentinel rows: {}", summary.sentinel_rows());
        for task in &summary.unique_tasks {
            println!("     - {}", task);
        }
    }

    write_report(cli, RunReport::new("scan", records.len(), summary))
}

fn run_relocate(cli: &Cli, args: &RelocateArgs) -> Result<()> {
    let records = table::read_relocation_table(&args.input)
        .with_context(|| format!("Failed to read relocation table: {:?}", args.input))?;

    let relocator = Relocator::new(&args.bids_root, args.pretty);
    log::info!("Relocating {} scans into {:?}", records.len(), relocator.bids_root());

    let progress_bar = make_progress_bar(cli, records.len())?;
    let outcomes = relocator.relocate_all(&records, progress_bar.as_ref())?;
    if let Some(pb) = &progress_bar {
        pb.finish_with_message("relocation complete");
    }

    let summary = RelocationSummary::from_outcomes(&outcomes);
    if cli.verbose > 0 {
        println!("\nRelocation Summary:");
        println!("   Scans: {}", outcomes.len());
        println!("   Sidecars patched: {}", summary.patched);
        for failure in &summary.failed {
            for error in &failure.errors {
                println!("     - {} ({:?}): {}", failure.source_path, failure.stage, error);
            }
        }
    }

    write_report(cli, RunReport::new("relocate", outcomes.len(), summary))
}

fn make_progress_bar(cli: &Cli, len: usize) -> Result<Option<ProgressBar>> {
    if !cli.progress {
        return Ok(None);
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    Ok(Some(pb))
}

fn write_report<S: serde::Serialize>(cli: &Cli, report: RunReport<S>) -> Result<()> {
    let Some(path) = &cli.report else {
        return Ok(());
    };
    report
        .write(path)
        .with_context(|| format!("Failed to write run report: {:?}", path))?;
    log::info!("Run report saved to {:?}", path);
    Ok(())
}
