//! Tribunal - multi-agent code review CLI
//!
//! The `tribunal` command reviews source trees with a panel of LLM agents.
//!
//! ## Commands
//!
//! - `review`: Review every matching file and write one report per file
//! - `plan`: Show how files would be chunked, without calling any agent
//! - `config`: Print the effective configuration as TOML

mod discover;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};

use tribunal_core::{BatchSummary, ReviewConfig, ReviewPipeline, SourceFile};
use tribunal_llm::openai::OpenAiBackend;

use crate::discover::discover_files;

#[derive(Parser)]
#[command(name = "tribunal")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-agent code review with supervisor arbitration", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Review every matching file under a directory
    Review {
        /// Directory to review
        directory: PathBuf,

        #[command(flatten)]
        options: ConfigOptions,

        /// Review files again even when complete reports already exist
        #[arg(long)]
        force: bool,
    },

    /// Show the chunk plan for every matching file (no agent calls)
    Plan {
        /// Directory to plan
        directory: PathBuf,

        #[command(flatten)]
        options: ConfigOptions,
    },

    /// Print the effective configuration
    Config {
        #[command(flatten)]
        options: ConfigOptions,
    },
}

/// Overrides layered on top of the defaults and the config file.
#[derive(Args, Debug, Default)]
struct ConfigOptions {
    /// TOML configuration file
    #[arg(short, long, env = "TRIBUNAL_CONFIG")]
    config: Option<PathBuf>,

    /// Comma-separated file extensions to review (e.g. ".cpp,.h")
    #[arg(short, long, value_delimiter = ',')]
    extensions: Vec<String>,

    /// Directory for report artifacts
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Files above this many lines are split into chunks
    #[arg(long)]
    threshold: Option<usize>,

    /// Lines per chunk for files above the threshold
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Maximum outstanding agent calls
    #[arg(long)]
    max_concurrency: Option<usize>,
}

impl ConfigOptions {
    /// Defaults, then the config file, then flags. The result is validated.
    fn resolve(&self) -> Result<ReviewConfig> {
        let mut config = match &self.config {
            Some(path) => ReviewConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ReviewConfig::default(),
        };

        if !self.extensions.is_empty() {
            config.extensions = self.extensions.clone();
        }
        if let Some(dir) = &self.results_dir {
            config.results_dir = dir.clone();
        }
        if let Some(threshold) = self.threshold {
            config.chunking.threshold_lines = threshold;
        }
        if let Some(chunk_lines) = self.chunk_size {
            config.chunking.chunk_lines = chunk_lines;
        }
        if let Some(max) = self.max_concurrency {
            config.max_concurrent_invocations = max;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tribunal_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Review {
            directory,
            options,
            force,
        } => cmd_review(&directory, &options, force).await,
        Commands::Plan { directory, options } => cmd_plan(&directory, &options),
        Commands::Config { options } => cmd_config(&options),
    }
}

async fn cmd_review(directory: &Path, options: &ConfigOptions, force: bool) -> Result<()> {
    let mut config = options.resolve()?;
    if force {
        config.reuse_existing = false;
    }

    let files = candidate_files(directory, &config)?;
    if files.is_empty() {
        println!("No files matching {} under {}", config.extensions.join(", "), directory.display());
        return Ok(());
    }

    let backend = OpenAiBackend::from_env().context("Failed to create completion backend")?;
    let results_dir = config.results_dir.clone();
    let pipeline = ReviewPipeline::new(config, Arc::new(backend)).context("Failed to build pipeline")?;
    info!(run_id = %pipeline.run_id(), files = files.len(), "Reviewing {}", directory.display());

    let summary = pipeline.run_batch(directory, &files).await;
    print_summary(&summary, directory);
    println!("Reports: {}", results_dir.display());

    if !summary.is_success() {
        bail!(
            "{} of {} file(s) not fully reviewed",
            summary.partial_count() + summary.failed_count(),
            summary.entries.len()
        );
    }
    Ok(())
}

fn cmd_plan(directory: &Path, options: &ConfigOptions) -> Result<()> {
    let config = options.resolve()?;
    let planner = config.planner()?;
    let files = candidate_files(directory, &config)?;

    println!(
        "Chunk plan for {} (threshold {}, chunk size {})",
        directory.display(),
        planner.threshold_lines(),
        planner.chunk_lines()
    );
    let mut total = 0;
    for path in &files {
        let file = SourceFile::read(path, directory)?;
        let chunks = planner.plan(&file);
        total += chunks.len();
        println!();
        println!("  {} [{}] {}", file.relative_path, file.language.as_str(), file.content_id());
        for chunk in &chunks {
            println!(
                "    chunk {}/{}: L{}-L{} ({} lines)",
                chunk.index,
                chunk.total,
                chunk.start_line,
                chunk.end_line(),
                chunk.line_count()
            );
        }
    }
    println!();
    println!("{} file(s), {} chunk(s)", files.len(), total);
    Ok(())
}

fn cmd_config(options: &ConfigOptions) -> Result<()> {
    let config = options.resolve()?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}

fn candidate_files(directory: &Path, config: &ReviewConfig) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        bail!("Not a directory: {}", directory.display());
    }
    discover_files(
        directory,
        &config.normalized_extensions(),
        Some(&config.results_dir),
    )
}

fn print_summary(summary: &BatchSummary, root: &Path) {
    println!("Run {} ({} ms)", summary.run_id, summary.duration_ms);
    for entry in &summary.entries {
        let name = entry
            .path
            .strip_prefix(root)
            .unwrap_or(&entry.path)
            .display();
        match &entry.result {
            Ok(outcome) if outcome.reused => {
                println!("  = {name}: reused ({} chunk(s))", outcome.reviewed_chunks)
            }
            Ok(outcome) if outcome.is_complete() => {
                println!("  ✓ {name}: {} chunk(s) reviewed", outcome.reviewed_chunks)
            }
            Ok(outcome) => println!(
                "  ! {name}: {} reviewed, {} failed",
                outcome.reviewed_chunks, outcome.failed_chunks
            ),
            Err(err) => println!("  ✗ {name}: {} error: {err}", err.kind()),
        }
    }
    println!(
        "{} complete, {} partial, {} failed",
        summary.complete_count(),
        summary.partial_count(),
        summary.failed_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tribunal.toml");
        std::fs::write(
            &path,
            "max_concurrent_invocations = 3\n[chunking]\nthreshold_lines = 100\nchunk_lines = 50\n",
        )
        .unwrap();

        let options = ConfigOptions {
            config: Some(path),
            chunk_size: Some(80),
            extensions: vec!["CC".to_string()],
            ..ConfigOptions::default()
        };
        let config = options.resolve().unwrap();
        assert_eq!(config.chunking.threshold_lines, 100);
        assert_eq!(config.chunking.chunk_lines, 80);
        assert_eq!(config.max_concurrent_invocations, 3);
        assert_eq!(config.normalized_extensions(), vec![".cc"]);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let options = ConfigOptions {
            chunk_size: Some(0),
            ..ConfigOptions::default()
        };
        assert!(options.resolve().is_err());
    }

    #[test]
    fn test_cli_parses_review_command() {
        let cli = Cli::try_parse_from([
            "tribunal",
            "--json",
            "review",
            "src",
            "--extensions",
            ".cpp,.h",
            "--force",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Review {
                directory,
                options,
                force,
            } => {
                assert_eq!(directory, PathBuf::from("src"));
                assert_eq!(options.extensions, vec![".cpp", ".h"]);
                assert!(force);
            }
            _ => panic!("expected review command"),
        }
    }
}
