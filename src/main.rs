use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::HumanCount;
use log::{LevelFilter, debug, error, info, warn};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use folder_dedup::{
    Cli, CorruptCachePolicy, ExitCode, IndexSource, RunOptions, RunSummary, format_human_elapsed,
    run,
};

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut builder = ConfigBuilder::new();
    builder.set_time_format_rfc3339();
    // UTC when the local offset cannot be determined.
    let _ = builder.set_time_offset_to_local();
    TermLogger::init(level, builder.build(), TerminalMode::Mixed, ColorChoice::Auto)
        .context("Failed to initialise logger")
}

fn print_summary(summary: &RunSummary) {
    let source = match summary.source {
        IndexSource::Scanned => "scan",
        IndexSource::ValidatedCache => "validated cache",
    };
    info!(
        "Index from {}: {} files, {} distinct contents",
        source,
        HumanCount(summary.index.file_count() as u64),
        HumanCount(summary.index.len() as u64)
    );
    if summary.hash_failures > 0 {
        warn!("{} files could not be hashed", summary.hash_failures);
    }
    if summary.stale_paths > 0 {
        warn!("{} cached paths were stale and dropped", summary.stale_paths);
    }

    let Some(report) = &summary.resolve else {
        return;
    };
    if report.groups_acted_on == 0 {
        println!("{}", "No duplicate files found within any folder!".green());
    } else {
        println!(
            "{}",
            format!(
                "Total duplicate folders found: {} ({} files removed)",
                report.groups_acted_on,
                report.deleted.len()
            )
            .yellow()
        );
    }
    if !report.failures.is_empty() {
        println!(
            "{}",
            format!("{} files could not be processed", report.failures.len()).red()
        );
    }
}

fn try_main(cli: Cli, cancel: Arc<AtomicBool>) -> Result<ExitCode> {
    let config = cli.resolve_config()?;
    debug!("Configuration: {:?}", config);

    let root = cli
        .path
        .canonicalize()
        .with_context(|| format!("Failed to resolve path: {}", cli.path.display()))?;
    if !root.is_dir() {
        anyhow::bail!("Path is not a directory: {}", root.display());
    }
    info!("Target directory: '{}'", root.display());

    let options = RunOptions {
        root,
        use_cache: cli.use_cache,
        delete: cli.delete,
        dry_run: cli.dry_run,
        on_corrupt_cache: if cli.rebuild_on_corrupt {
            CorruptCachePolicy::Rebuild
        } else {
            CorruptCachePolicy::Abort
        },
        show_progress: !cli.no_progress,
        cancel: Some(cancel.clone()),
    };
    let summary = run(&config, &options)?;
    print_summary(&summary);

    if cancel.load(Ordering::SeqCst) {
        return Ok(ExitCode::Interrupted);
    }
    Ok(ExitCode::Success)
}

fn main() {
    let start_time = Instant::now();
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("{e:#}");
    }
    info!("Starting folder-dedup v{}", env!("CARGO_PKG_VERSION"));
    debug!("Command line arguments: {:?}", cli);

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        // A second Ctrl+C aborts immediately, even in the middle of hashing.
        if handler_flag.swap(true, Ordering::SeqCst) {
            std::process::exit(ExitCode::Interrupted.as_i32());
        }
        eprintln!("Interrupted; finishing the current step (press Ctrl+C again to abort)");
    }) {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }

    let code = match try_main(cli, cancel) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            let code = ExitCode::for_error(&e);
            if code == ExitCode::CorruptCache {
                error!("Re-run without --use-cache, or with --rebuild-on-corrupt");
            }
            code
        }
    };

    info!(
        "Finished in {}",
        format_human_elapsed(start_time.elapsed())
    );
    std::process::exit(code.as_i32());
}
