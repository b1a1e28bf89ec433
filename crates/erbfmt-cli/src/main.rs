//! erbfmt CLI - format ERB templates with htmlbeautifier
//!
//! Files are handed to an external `htmlbeautifier` (optionally through
//! `bundle exec`), one process per file. Settings come from `.erbfmt.toml`
//! and the flags below.

mod config;
mod lsp;
mod output;
mod process;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use erbfmt_core::{Config, FormatOutcome, FormatService};
use output::{OutputFormat, Reporter};
use process::{collect_files, format_file, write_file, FileOutcome};

/// Path used for ignore matching when stdin has no `--stdin-filepath`
const STDIN_PATH: &str = "<stdin>";

/// Environment variable holding the log filter
const LOG_ENV: &str = "ERBFMT_LOG";

#[derive(Parser)]
#[command(name = "erbfmt")]
#[command(version)]
#[command(about = "Format ERB templates with htmlbeautifier")]
struct Cli {
    /// Files or directories to format. Reads stdin when empty
    paths: Vec<PathBuf>,

    /// Report files that would change without writing them (default for paths)
    #[arg(long, conflicts_with = "write")]
    check: bool,

    /// Rewrite files in place
    #[arg(long, short = 'w', conflicts_with = "check")]
    write: bool,

    /// Output format: text, json, diff
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    format: String,

    /// Shorthand for --format json
    #[arg(long, conflicts_with_all = ["format", "diff"])]
    json: bool,

    /// Shorthand for --format diff
    #[arg(long, conflicts_with = "format")]
    diff: bool,

    /// Path of the document read from stdin, used for ignore patterns
    #[arg(long, value_name = "PATH")]
    stdin_filepath: Option<PathBuf>,

    /// Path to config file (default: auto-detect .erbfmt.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Ignore config files
    #[arg(long)]
    no_config: bool,

    /// Formatter executable, overrides `executePath`
    #[arg(long, value_name = "PATH")]
    execute_path: Option<String>,

    /// Run the formatter through `bundle exec`
    #[arg(long)]
    use_bundler: bool,

    /// Make sure formatted output ends with a newline
    #[arg(long)]
    insert_final_newline: bool,

    /// Show verbose output
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Run as a language server on stdio
    #[arg(long, conflicts_with_all = ["paths", "check", "write"])]
    lsp: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output_format = if cli.json {
        OutputFormat::Json
    } else if cli.diff {
        OutputFormat::Diff
    } else {
        OutputFormat::from_str(&cli.format).ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid output format '{}'. Valid options: text, json, diff",
                cli.format
            )
        })?
    };

    let config = load_config(&cli)?;

    if cli.lsp {
        lsp::run_lsp_server(config).await;
        return Ok(ExitCode::SUCCESS);
    }

    if cli.paths.is_empty() {
        return format_stdin(&cli, config).await;
    }

    format_paths(&cli, config, output_format).await
}

/// Logs go to stderr; stdout carries formatted text or the LSP stream
fn init_logging(verbose: bool) {
    use tracing_subscriber::filter::{EnvFilter, LevelFilter};
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let default_level = if verbose {
        LevelFilter::INFO
    } else {
        LevelFilter::WARN
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if cli.no_config {
        Config::default()
    } else if let Some(config_path) = &cli.config {
        let cfg = config::load_path(config_path)?;
        tracing::info!(path = %config_path.display(), "using config");
        cfg
    } else {
        match config::load()? {
            Some((cfg, path)) => {
                tracing::info!(path = %path.display(), "using config");
                cfg
            }
            None => Config::default(),
        }
    };

    if let Some(execute_path) = &cli.execute_path {
        config.execute_path = execute_path.clone();
    }
    if cli.use_bundler {
        config.use_bundler = true;
    }
    if cli.insert_final_newline {
        config.insert_final_newline = true;
    }
    Ok(config)
}

async fn format_stdin(cli: &Cli, config: Config) -> Result<ExitCode> {
    let mut source = String::new();
    tokio::io::stdin()
        .read_to_string(&mut source)
        .await
        .context("Failed to read stdin")?;

    let path = cli
        .stdin_filepath
        .clone()
        .unwrap_or_else(|| PathBuf::from(STDIN_PATH));

    let service = FormatService::new(config);
    let outcome = service.format(&source, &path).await?;
    if let FormatOutcome::Ignored(_) = outcome {
        tracing::info!(path = %path.display(), "ignored, echoing input");
    }
    let formatted = outcome.into_text();

    if cli.check {
        return Ok(if formatted == source {
            ExitCode::SUCCESS
        } else {
            eprintln!("{} {}", "Would reformat:".yellow(), path.display());
            ExitCode::from(2)
        });
    }

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(formatted.as_bytes())
        .await
        .context("Failed to write stdout")?;
    stdout.flush().await.context("Failed to write stdout")?;
    Ok(ExitCode::SUCCESS)
}

async fn format_paths(cli: &Cli, config: Config, output_format: OutputFormat) -> Result<ExitCode> {
    let write_mode = cli.write;
    let check_mode = !write_mode;

    let collected = collect_files(&cli.paths);
    for path in &collected.missing {
        eprintln!(
            "{}: Path not found: {}",
            "Warning".yellow(),
            path.display()
        );
    }

    if collected.files.is_empty() {
        if output_format == OutputFormat::Text {
            println!("No ERB files found");
        }
        return Ok(if collected.missing.is_empty() {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        });
    }

    let results = format_all(FormatService::new(config), collected.files).await?;

    let mut reporter = Reporter::new(output_format, cli.verbose);
    for (path, result) in results {
        report_result(&mut reporter, &path, result, write_mode);
    }

    let summary = reporter.summary().clone();
    reporter.finish(check_mode)?;

    let exit_code = if summary.errors > 0 || !collected.missing.is_empty() {
        ExitCode::from(1)
    } else if check_mode && summary.files_changed > 0 {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    };

    Ok(exit_code)
}

/// Format every file concurrently, one formatter process each
///
/// Results come back sorted by path regardless of completion order.
async fn format_all(
    service: FormatService,
    files: Vec<PathBuf>,
) -> Result<Vec<(PathBuf, Result<FileOutcome>)>> {
    let service = Arc::new(service);
    let limit = std::thread::available_parallelism().map_or(4, |n| n.get());
    let permits = Arc::new(Semaphore::new(limit));

    let mut tasks = JoinSet::new();
    for path in files {
        let service = Arc::clone(&service);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let result = match permits.acquire_owned().await {
                Ok(_permit) => format_file(&*service, &path).await,
                Err(e) => Err(e.into()),
            };
            (path, result)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        results.push(joined.context("formatting task panicked")?);
    }
    results.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(results)
}

fn report_result(reporter: &mut Reporter, path: &Path, result: Result<FileOutcome>, write_mode: bool) {
    match result {
        Ok(FileOutcome::Unchanged) => reporter.report_unchanged(path),
        Ok(FileOutcome::Ignored) => reporter.report_ignored(path),
        Ok(FileOutcome::Changed {
            old_source,
            new_source,
        }) => {
            if write_mode {
                match write_file(path, &new_source) {
                    Ok(()) => reporter.report_write(path),
                    Err(e) => reporter.report_error(path, &format!("{:#}", e)),
                }
            } else {
                reporter.report_check(path, &old_source, &new_source);
            }
        }
        Err(e) => reporter.report_error(path, &format!("{:#}", e)),
    }
}
