//! # Arrange CLI
//!
//! Command-line front end for the arrange media archiver.
//!
//! ## Usage
//! ```bash
//! # Create the archive layout
//! arrange init /archive
//!
//! # Ingest a camera dump
//! arrange run /media/camera /archive --progress
//!
//! # Show which capture time a file would be filed under
//! arrange meta IMG_0001.JPG clip.mov
//!
//! # Re-link the date index after copying an archive
//! arrange repair /archive
//! ```

use arrange::meta::resolve_all;
use arrange::repair::{relink_with, Repair};
use arrange::{Archive, ArrangeError, Classification, Outcome, PipelineBuilder, Result};
use clap::{Parser, Subcommand};
use colored::*;
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Arrange - deduplicating, date-indexed media archiver
#[derive(Parser)]
#[command(name = "arrange")]
#[command(version)]
#[command(about = "Archive photos and videos by content and capture time")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the archive layout in a directory
    Init {
        /// Archive root
        dest: PathBuf,
    },

    /// Ingest every media file under a source directory
    Run {
        /// Directory to ingest
        source: PathBuf,

        /// Archive root (created if missing)
        dest: PathBuf,

        /// Number of parser threads (defaults to the CPU count)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Follow symbolic links in the source tree
        #[arg(long)]
        follow_symlinks: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,

        /// Show a progress spinner
        #[arg(long)]
        progress: bool,
    },

    /// Print the capture time each file would be archived under
    Meta {
        /// Files to inspect
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Number of threads (defaults to the CPU count)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Re-link the date index to the content store
    Repair {
        /// Archive root
        dest: PathBuf,

        /// Number of parser threads (defaults to the CPU count)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e.user_message());
            std::process::exit(1);
        }
    }
}

/// Main command runner
///
/// Returns `Ok(false)` when the command completed but some files failed.
fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Init { dest } => cmd_init(dest).map(|()| true),
        Commands::Run {
            source,
            dest,
            workers,
            follow_symlinks,
            json,
            progress,
        } => cmd_run(source, dest, workers, follow_symlinks, json, progress),
        Commands::Meta { files, workers } => cmd_meta(files, workers),
        Commands::Repair { dest, workers, json } => cmd_repair(dest, workers, json),
    }
}

/// Create the content buckets and date root
fn cmd_init(dest: PathBuf) -> Result<()> {
    let archive = Archive::prepare(&dest)?;

    println!("{} Initialized archive", "✓".green().bold());
    println!("  Content: {}", archive.content_root().display().to_string().cyan());
    println!("  Index: {}", archive.date_root().display().to_string().cyan());
    println!("\nNext step:");
    println!(
        "  - Ingest media: {}",
        format!("arrange run <source> {}", dest.display()).yellow()
    );
    Ok(())
}

/// Ingest a source tree
fn cmd_run(
    source: PathBuf,
    dest: PathBuf,
    workers: Option<usize>,
    follow_symlinks: bool,
    json: bool,
    show_progress: bool,
) -> Result<bool> {
    Archive::prepare(&dest)?;
    let mut builder = PipelineBuilder::new().follow_symlinks(follow_symlinks);
    if let Some(workers) = workers {
        builder = builder.workers(workers);
    }
    let mut run = builder.build(&source, &dest)?.run()?;

    if !json {
        println!(
            "{} {} {} {}",
            "Arranging".blue().bold(),
            source.display().to_string().cyan(),
            "into".blue().bold(),
            dest.display().to_string().cyan()
        );
    }

    let start = Instant::now();
    let progress = if show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(spinner_style());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Scanning...");
        Some(pb)
    } else {
        None
    };

    while let Some(outcome) = run.next() {
        if let Outcome::Failed { path, error } = &outcome {
            let line = format!("{} {}: {}", "✗".red(), path.display(), error);
            match &progress {
                Some(pb) => pb.println(line),
                None => eprintln!("{}", line),
            }
        }
        if let Some(pb) = &progress {
            let so_far = run.summary();
            pb.set_message(format!(
                "{} placed, {} duplicates, {} skipped, {} failed",
                so_far.placed, so_far.duplicates, so_far.skipped, so_far.failed
            ));
        }
    }
    let summary = run.finish()?;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if json {
        let out = serde_json::to_string_pretty(&summary)
            .map_err(|e| ArrangeError::internal(format!("Failed to serialize summary: {}", e)))?;
        println!("{}", out);
        return Ok(summary.is_clean());
    }

    let status = if summary.is_clean() {
        "✓".green().bold()
    } else {
        "!".yellow().bold()
    };
    println!("{} Processed {} files", status, summary.total().to_string().cyan());
    println!("  Placed: {}", summary.placed.to_string().green());
    println!("  Duplicates: {}", summary.duplicates.to_string().cyan());
    println!("  Skipped: {}", summary.skipped.to_string().yellow());
    if summary.failed > 0 {
        println!("  Failed: {}", summary.failed.to_string().red());
    }
    println!("  Time: {}", format_duration(round_duration(start.elapsed())).to_string().cyan());

    Ok(summary.is_clean())
}

/// Resolve capture times without touching an archive
fn cmd_meta(files: Vec<PathBuf>, workers: Option<usize>) -> Result<bool> {
    let workers = workers.unwrap_or_else(num_cpus::get);
    let mut clean = true;

    for (path, result) in resolve_all(files, workers)? {
        match result {
            Ok(Classification::Media(record)) => {
                println!(
                    "{}: {} {}",
                    record.captured_at.to_rfc3339(),
                    path.display(),
                    format!("({})", record.time_source).dimmed()
                );
            }
            Ok(Classification::NotMedia) => {
                eprintln!("{} {}: not media", "?".yellow(), path.display());
            }
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e.user_message());
                clean = false;
            }
        }
    }
    Ok(clean)
}

/// Re-link index entries to their content
fn cmd_repair(dest: PathBuf, workers: Option<usize>, json: bool) -> Result<bool> {
    let workers = workers.unwrap_or_else(num_cpus::get);
    let start = Instant::now();

    let summary = relink_with(&dest, workers, |repair| match repair {
        Repair::Relinked { entry, .. } if !json => {
            println!("{} {}", "↺".green(), entry.display());
        }
        Repair::MissingContent { entry, content } => {
            eprintln!(
                "{} {}: no content at {}",
                "!".yellow(),
                entry.display(),
                content.display()
            );
        }
        Repair::Failed { error, .. } => {
            eprintln!("{} {}", "✗".red(), error);
        }
        _ => {}
    })?;

    if json {
        let out = serde_json::to_string_pretty(&summary)
            .map_err(|e| ArrangeError::internal(format!("Failed to serialize summary: {}", e)))?;
        println!("{}", out);
    } else {
        println!("{} Checked {} index entries", "✓".green().bold(), summary.total().to_string().cyan());
        println!("  Relinked: {}", summary.relinked.to_string().green());
        println!("  Already linked: {}", summary.already_linked.to_string().cyan());
        if summary.missing_content > 0 {
            println!("  Missing content: {}", summary.missing_content.to_string().yellow());
        }
        if summary.failed > 0 {
            println!("  Failed: {}", summary.failed.to_string().red());
        }
        println!("  Time: {}", format_duration(round_duration(start.elapsed())).to_string().cyan());
    }

    Ok(summary.failed == 0)
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Drop sub-millisecond noise from a duration before display
fn round_duration(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}
