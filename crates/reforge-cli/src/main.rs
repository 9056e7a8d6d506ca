//! Reforge CLI - convert a local project directory
//!
//! # Usage
//! ```bash
//! reforge convert ./android-app --out ./ios-app --preset swift-ui
//! reforge classify ./android-app
//! reforge context ./android-app --json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use reforge_agent::{CompilerMode, OracleMode, Orchestrator, ReforgeConfig};
use reforge_core::{
    BatchResult, Direction, FileClassifier, Language, Preset, ProjectContext, TransformOptions,
};

mod ingest;

const ALL_LANGUAGES: &[Language] = &[Language::Kotlin, Language::Java, Language::Swift];

/// Reforge - multi-file code conversion with verified output
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (JSON or TOML)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every source file of a project
    Convert {
        /// Project root
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "reforge-out")]
        out: PathBuf,

        /// kotlin-to-swift or swift-to-kotlin
        #[arg(short, long)]
        direction: Option<Direction>,

        /// Target framework preset (default, swift-ui, ui-kit, compose, views)
        #[arg(short, long)]
        preset: Option<Preset>,

        /// Concrete model for the Transformation Oracle
        #[arg(long)]
        model: Option<String>,

        /// Model hint resolved through oracle.model_hints
        #[arg(long)]
        model_hint: Option<String>,

        #[arg(long)]
        temperature: Option<f64>,

        #[arg(long)]
        max_attempts: Option<u32>,

        /// Skip the Transformation Oracle and write placeholders
        #[arg(long)]
        offline: bool,

        /// Accept every candidate without a Compiler Oracle
        #[arg(long)]
        no_validate: bool,

        /// Print the report JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Show the sequential/parallel lane of every file
    Classify {
        input: PathBuf,

        /// Sequential lane threshold (overrides the configuration)
        #[arg(long)]
        threshold: Option<u32>,

        #[arg(long)]
        json: bool,
    },

    /// Print the project context handed to the oracle
    Context {
        input: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    init_logging(cli.verbose);

    let mut config = ReforgeConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Convert {
            input,
            out,
            direction,
            preset,
            model,
            model_hint,
            temperature,
            max_attempts,
            offline,
            no_validate,
            json,
        } => {
            if offline {
                config.oracle.mode = OracleMode::Fallback;
            }
            if no_validate {
                config.compiler.mode = CompilerMode::Disabled;
            }

            let options = TransformOptions {
                direction,
                preset,
                temperature,
                max_attempts,
                model,
                model_hint,
            };
            let direction = options
                .merged_over(&config.effective_defaults())
                .direction
                .unwrap_or_default();

            let files = ingest::collect_sources(&input, ingest::source_languages(direction))?;
            if files.is_empty() {
                println!(
                    "{} no {} sources found under {}",
                    "warning:".yellow().bold(),
                    direction,
                    input.display()
                );
                return Ok(());
            }

            let orchestrator = Orchestrator::from_config(&config)?;
            let batch = orchestrator.run(files, &options).await?;
            let report_path = ingest::write_outputs(&batch, &out)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&batch)?);
            } else {
                print_summary(&batch);
                println!("Report: {}", report_path.display());
            }

            if !batch.success {
                std::process::exit(1);
            }
        }
        Commands::Classify {
            input,
            threshold,
            json,
        } => {
            let files = ingest::collect_sources(&input, ALL_LANGUAGES)?;
            let classifier =
                FileClassifier::new(threshold.unwrap_or(config.pipeline.sequential_threshold));
            let lanes = classifier.classify(&files);

            if json {
                println!("{}", serde_json::to_string_pretty(&lanes.scores)?);
            } else {
                println!("{}", "Sequential lane".bold());
                for file in &lanes.sequential {
                    println!("  {:>3}  {}", lanes.scores[&file.path], file.path.cyan());
                }
                println!("{}", "Parallel lane".bold());
                for file in &lanes.parallel {
                    println!("  {:>3}  {}", lanes.scores[&file.path], file.path);
                }
            }
        }
        Commands::Context { input, json } => {
            let files = ingest::collect_sources(&input, ALL_LANGUAGES)?;
            let context = ProjectContext::summarize(&files);

            if json {
                println!("{}", serde_json::to_string_pretty(&context)?);
            } else {
                println!("{}", context.render());
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(batch: &BatchResult) {
    println!();
    for result in &batch.results {
        let status = if result.verified {
            "verified".green()
        } else if result.placeholder {
            "placeholder".yellow()
        } else {
            "unverified".red()
        };
        println!(
            "  {:<12} {} -> {} ({} attempts)",
            status, result.path, result.output_path, result.attempts
        );
    }
    for error in &batch.errors {
        println!("  {:<12} {}: {}", "error".red().bold(), error.path, error.error);
    }

    let stats = &batch.stats;
    println!();
    println!(
        "{} files ({} sequential, {} parallel) in {} ms",
        stats.total_files,
        stats.sequential_files,
        stats.parallel_files,
        batch.duration_ms()
    );
    println!(
        "{} verified, {} exhausted, {} placeholders, {} errors, {} oracle attempts",
        stats.verified.to_string().green(),
        stats.exhausted.to_string().red(),
        stats.placeholders.to_string().yellow(),
        stats.errors,
        stats.total_attempts
    );
}
