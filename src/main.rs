//! pagecrawl main entry point
//!
//! This is the command-line interface for the pagecrawl pagination crawler.

use anyhow::{bail, Context};
use clap::Parser;
use pagecrawl::config::{load_config_with_hash, Config};
use pagecrawl::crawler::{build_jobs, Scheduler, SourceJob};
use pagecrawl::extract::ExtractorRegistry;
use pagecrawl::output::{aggregate_jsonl, print_report, RunReport};
use pagecrawl::storage::{open_progress_store, RunHistory, RunStatus, SqliteStorage};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// pagecrawl: a resumable concurrent pagination crawler
///
/// pagecrawl walks paginated listings page by page for every configured
/// source, appends records to per-source JSONL files as it goes and resumes
/// interrupted sources from the last saved cursor.
#[derive(Parser, Debug)]
#[command(name = "pagecrawl")]
#[command(version = "1.0.0")]
#[command(about = "A resumable concurrent pagination crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Forget saved progress and start every selected source from its url
    #[arg(long)]
    fresh: bool,

    /// Crawl only this source; exits with an error if it fails
    #[arg(long, value_name = "NAME")]
    source: Option<String>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "aggregate"])]
    dry_run: bool,

    /// Show the latest run from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "aggregate"])]
    stats: bool,

    /// Merge per-source output into one JSON file and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    aggregate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Kept alive so buffered file logs are flushed on exit
    let _guard = setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.aggregate {
        handle_aggregate(&config)?;
    } else {
        return handle_crawl(config, &config_hash, cli.fresh, cli.source.as_deref()).await;
    }

    Ok(ExitCode::SUCCESS)
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// With a log file, a second non-blocking layer writes the same events there.
fn setup_logging(
    verbose: u8,
    quiet: bool,
    log_file: Option<&Path>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagecrawl=info,warn"),
            1 => EnvFilter::new("pagecrawl=debug,info"),
            2 => EnvFilter::new("pagecrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let mut layers = Vec::new();
    layers.push(
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .boxed(),
    );

    let mut guard = None;
    if let Some(path) = log_file {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let name = path
            .file_name()
            .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

        let (writer, worker_guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer)
                .boxed(),
        );
        guard = Some(worker_guard);
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let registry = ExtractorRegistry::with_builtin();

    println!("=== pagecrawl Dry Run ===\n");

    println!("Settings:");
    println!("  Max workers: {}", config.settings.max_workers);
    println!("  Output directory: {}", config.settings.output_dir);
    println!("  Database: {}", config.settings.database_path);
    println!("  Progress backend: {:?}", config.settings.progress_backend);

    println!("\nFetch:");
    println!(
        "  Timeouts: connect {}ms, request {}ms",
        config.fetch.connect_timeout_ms, config.fetch.request_timeout_ms
    );
    println!(
        "  Retries: {} (backoff {}ms, max {}ms) on {:?}",
        config.fetch.max_retries,
        config.fetch.backoff_base_ms,
        config.fetch.max_backoff_ms,
        config.fetch.retry_statuses
    );
    println!("  Fatal statuses: {:?}", config.fetch.fatal_statuses);

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        let marker = if source.enabled { "-" } else { "x" };
        println!(
            "  {} {} [{}] {}",
            marker, source.name, source.extractor, source.url
        );
        if let Some(max) = source.max_pages {
            println!("    max pages per run: {}", max);
        }
        if let Some(keyword) = &source.filter_keyword {
            println!("    filter: {}", keyword);
        }
    }

    // Fails on an extractor key nothing is registered for
    let jobs = build_jobs(config, &registry)?;

    println!("\n✓ Configuration is valid");
    println!("✓ Would crawl {} enabled source(s)", jobs.len());

    Ok(())
}

/// Handles the --stats mode: shows the latest run from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.settings.database_path);

    let storage = SqliteStorage::new(Path::new(&config.settings.database_path))?;

    let Some(run) = storage.get_latest_run()? else {
        println!("No runs recorded yet.");
        return Ok(());
    };

    println!(
        "Run {} ({}) started {}{}",
        run.id,
        run.status.to_db_string(),
        run.started_at,
        run.finished_at
            .as_deref()
            .map(|f| format!(", finished {}", f))
            .unwrap_or_default()
    );

    let mut report = RunReport::new();
    for outcome in storage.get_outcomes(run.id)? {
        report.insert(outcome);
    }
    report.elapsed = report.iter().map(|o| o.elapsed).max().unwrap_or_default();
    print_report(&report);

    Ok(())
}

/// Handles the --aggregate mode: merges per-source output into one file
fn handle_aggregate(config: &Config) -> anyhow::Result<()> {
    let dir = Path::new(&config.settings.output_dir);
    let output = dir.join(&config.settings.aggregate_file);
    let sources: Vec<&str> = config.enabled_sources().map(|s| s.name.as_str()).collect();

    let count = aggregate_jsonl(dir, &sources, &output)?;

    println!(
        "✓ Aggregated {} record(s) from {} source(s) into {}",
        count,
        sources.len(),
        output.display()
    );
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: &str,
    fresh: bool,
    only: Option<&str>,
) -> anyhow::Result<ExitCode> {
    let registry = ExtractorRegistry::with_builtin();

    let jobs = match only {
        Some(name) => {
            let Some(source) = config.source(name) else {
                bail!("No source named '{}' in the configuration", name);
            };
            vec![SourceJob::new(source.clone(), registry.build(source)?)]
        }
        None => build_jobs(&config, &registry)?,
    };

    let database = Arc::new(
        SqliteStorage::new(Path::new(&config.settings.database_path))
            .context("Failed to open run database")?,
    );
    let progress = open_progress_store(&config.settings, &database)?;

    for run_id in database.mark_interrupted_runs()? {
        tracing::warn!("Run {} did not finish; marked interrupted", run_id);
    }

    if fresh {
        tracing::info!("Starting fresh crawl (ignoring saved progress)");
        for job in &jobs {
            progress.reset(job.name())?;
        }
    }

    let run_id = database.create_run(config_hash)?;
    tracing::info!("Started run {}", run_id);

    let scheduler = Scheduler::new(&config, progress).with_history(database.clone(), run_id);

    let code = if only.is_some() {
        let started = std::time::Instant::now();
        let mut report = RunReport::new();
        for job in jobs {
            report.insert(scheduler.run_one(job).await);
        }
        report.elapsed = started.elapsed();
        print_report(&report);

        if report.failed_sources().is_empty() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    } else {
        let report = scheduler.run(jobs).await;
        print_report(&report);
        ExitCode::SUCCESS
    };

    database.finish_run(run_id, RunStatus::Completed)?;
    Ok(code)
}
