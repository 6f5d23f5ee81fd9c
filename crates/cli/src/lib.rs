//! CLI for Benchwatch.
//!
//! This crate provides the `benchwatch` command: an offline `compare` of two
//! result artifacts, a one-shot `evaluate` of a base/head pair, and `status`.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

use anyhow::{bail, Context};
use benchwatch_adapters::{CommentPoster, GitHubClient, RunOrchestrator, Settings};
use benchwatch_benchmarks::io::{read_artifact, write_result_json};
use benchwatch_benchmarks::{build_report, Report, ReportOptions};
use benchwatch_core::{EvaluationRun, SourceRef};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Benchwatch CLI.
#[derive(Parser, Debug)]
#[command(name = "benchwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare two raw result artifacts and print the markdown report.
    Compare {
        /// Base (target branch) artifact.
        base: PathBuf,

        /// Head (PR branch) artifact.
        head: PathBuf,

        /// Decimal places for counts and differences.
        #[arg(short, long, default_value_t = benchwatch_benchmarks::format::DEFAULT_PRECISION)]
        precision: usize,

        /// Write the report to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write both normalized results into this directory.
        #[arg(long)]
        emit_normalized: Option<PathBuf>,
    },

    /// Build and benchmark a base/head pair and report the comparison.
    Evaluate {
        /// Base clone URL.
        #[arg(long)]
        base: String,

        /// Base branch.
        #[arg(long)]
        base_branch: Option<String>,

        /// Head clone URL.
        #[arg(long)]
        head: String,

        /// Head branch.
        #[arg(long)]
        head_branch: Option<String>,

        /// Pull request number to comment on.
        #[arg(long)]
        pr: u64,

        /// Configuration file.
        #[arg(short, long, env = "BENCHWATCH_CONFIG")]
        config: Option<PathBuf>,

        /// Print the report instead of posting it.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show version and effective configuration.
    Status {
        /// Configuration file.
        #[arg(short, long, env = "BENCHWATCH_CONFIG")]
        config: Option<PathBuf>,
    },
}

/// Run the CLI with the process arguments.
pub fn run() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Compare {
            base,
            head,
            precision,
            output,
            emit_normalized,
        } => {
            let report = compare_files(&base, &head, precision, emit_normalized.as_deref())?;
            for warning in &report.comparison.warnings {
                eprintln!("warning: {}", warning);
            }
            match output {
                Some(path) => std::fs::write(&path, &report.body)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => print!("{}", report.body),
            }
            Ok(())
        }
        Commands::Evaluate {
            base,
            base_branch,
            head,
            head_branch,
            pr,
            config,
            dry_run,
        } => {
            let settings = Settings::load(config.as_deref())?;
            let run = EvaluationRun::new(
                source(base, base_branch),
                source(head, head_branch),
                pr,
            );
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start async runtime")?;
            runtime.block_on(evaluate(&settings, run, dry_run))
        }
        Commands::Status { config } => {
            let settings = Settings::load(config.as_deref())?;
            println!("Benchwatch {}", env!("CARGO_PKG_VERSION"));
            println!(
                "GitHub token: {}",
                if settings.github.token.is_some() {
                    "configured"
                } else {
                    "not configured"
                }
            );
            println!();
            print!("{}", toml::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

/// Read two artifacts and build the report, optionally writing the
/// normalized results to `emit_dir` as `base.json` and `head.json`.
pub fn compare_files(
    base: &Path,
    head: &Path,
    precision: usize,
    emit_dir: Option<&Path>,
) -> anyhow::Result<Report> {
    if precision > benchwatch_adapters::config::MAX_PRECISION {
        bail!(
            "precision must be at most {}",
            benchwatch_adapters::config::MAX_PRECISION
        );
    }
    let base = read_artifact(base)?;
    let head = read_artifact(head)?;
    if let Some(dir) = emit_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        write_result_json(&base, dir.join("base.json"))?;
        write_result_json(&head, dir.join("head.json"))?;
    }
    Ok(build_report(
        &base,
        &head,
        &ReportOptions {
            decimal_precision: precision,
        },
    ))
}

async fn evaluate(settings: &Settings, run: EvaluationRun, dry_run: bool) -> anyhow::Result<()> {
    let poster: Option<Arc<dyn CommentPoster>> = if dry_run {
        None
    } else {
        settings.github.require_target()?;
        Some(Arc::new(GitHubClient::new(
            settings.github.api_url.clone(),
            settings.github.token.clone(),
        )?))
    };

    let orchestrator = RunOrchestrator::from_settings(settings, poster);
    let summary = orchestrator.evaluate(run).await?;

    if dry_run {
        if let Some(report) = &summary.report {
            print!("{}", report.body);
        }
    }
    eprintln!(
        "run {} finished: {} ({} warnings, {} ms)",
        summary.record.run_id,
        summary
            .record
            .outcome
            .map_or("unknown", |outcome| outcome.as_str()),
        summary.record.warnings,
        summary.record.duration_ms().unwrap_or_default()
    );
    Ok(())
}

fn source(url: String, branch: Option<String>) -> SourceRef {
    let source = SourceRef::new(url);
    match branch {
        Some(branch) => source.with_revision(branch),
        None => source,
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
