//! Enhance Audio CLI
//!
//! Command-line interface for the quality-adaptive enhancement pipeline.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tracing_subscriber::EnvFilter;

use enhance_audio::cli::{commands, Cli, Commands};
use enhance_audio::config::Settings;
use enhance_audio::EnhanceError;

fn main() {
    let cli = Cli::parse();

    let code = match Settings::from_env() {
        Ok(settings) => {
            init_logging(&cli, &settings);
            info!("Enhance Audio v{}", env!("CARGO_PKG_VERSION"));
            match handle_command(cli.command, &settings) {
                Ok(()) => 0,
                Err(err) => report_error(&err),
            }
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            err.exit_code()
        }
    };

    std::process::exit(code);
}

/// `--quiet` and `-v` win over `ENHANCE_AUDIO_LOG_LEVEL`, which wins over `RUST_LOG`
fn init_logging(cli: &Cli, settings: &Settings) {
    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else if let Some(level) = &settings.log_level {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_command(cmd: Commands, settings: &Settings) -> Result<()> {
    match cmd {
        Commands::Enhance {
            input,
            output,
            processing,
            dry_run,
        } => commands::enhance(&input, output.as_deref(), &processing, dry_run, settings)
            .with_context(|| format!("enhancing {}", input.display())),
        Commands::Analyze { input, json } => commands::analyze_file(&input, json)
            .with_context(|| format!("analyzing {}", input.display())),
        Commands::Batch {
            dir,
            output_dir,
            jobs,
            processing,
        } => commands::batch(&dir, output_dir.as_deref(), jobs, &processing, settings)
            .with_context(|| format!("batch processing {}", dir.display())),
    }
}

/// Print the error chain and suggestions; returns the exit code
fn report_error(err: &anyhow::Error) -> i32 {
    eprintln!("Error: {:#}", err);

    match err.downcast_ref::<EnhanceError>() {
        Some(enhance_err) => {
            for suggestion in enhance_err.recovery_suggestions() {
                eprintln!("  hint: {}", suggestion);
            }
            enhance_err.exit_code()
        }
        None => 1,
    }
}
