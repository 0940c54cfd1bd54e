//! LEGE runtime - CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process::ExitCode;

use lege::util::config::{load_config, RuntimeConfig};
use lege::util::logger::{self, LogLevel};
use lege::{check_file, run_file, run_with_config, RunSummary, NAME, VERSION};

/// Cooperative task scheduling for LegeScript
#[derive(Parser, Debug)]
#[command(name = "lege")]
#[command(author = "LEGE Team")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ./lege.toml when present)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a LegeScript source file
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Stop with an error after this many ticks
        #[arg(long, value_name = "N")]
        max_ticks: Option<u64>,
    },

    /// Evaluate LegeScript code from command line
    Eval {
        /// Code to evaluate
        #[arg(value_name = "CODE")]
        code: String,
    },

    /// Check source file for errors without running it
    Check {
        /// Source file to check
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print version information
    Version,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn execute(args: Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let level = if args.verbose {
        LogLevel::Debug
    } else {
        config.log.level
    };
    logger::init_with_level(level);

    match args.command {
        Commands::Run { file, max_ticks } => {
            if let Some(max_ticks) = max_ticks {
                config.runtime.max_ticks = max_ticks;
            }
            let summary = run_file(&file, &config)
                .with_context(|| format!("Failed to run: {}", file.display()))?;
            report(&summary, &config);
        }
        Commands::Eval { code } => {
            let summary =
                run_with_config(&code, "eval", &config).context("Failed to evaluate code")?;
            report(&summary, &config);
        }
        Commands::Check { file } => {
            check_file(&file).with_context(|| format!("Failed to check: {}", file.display()))?;
            eprintln!("{} {}", "ok:".green().bold(), file.display());
        }
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
        }
    }

    Ok(())
}

fn report(
    summary: &RunSummary,
    config: &RuntimeConfig,
) {
    if summary.stalled {
        eprintln!(
            "{} stopped after {} ticks with {} blocked task(s) that nothing can wake",
            "warning:".yellow().bold(),
            summary.ticks,
            summary.blocked
        );
    }
    tracing::debug!(
        ticks = summary.ticks,
        resumes = summary.stats.resumes,
        max_ticks = config.runtime.max_ticks,
        "done"
    );
}
