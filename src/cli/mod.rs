//! CLI Module
//!
//! Command-line interface for the enhance-audio pipeline.

pub mod commands;
pub mod report;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::QualityLevel;
use crate::pipeline::UserOverride;

/// Enhance Audio - quality-adaptive WAV enhancement
#[derive(Parser, Debug)]
#[command(name = "enhance-audio")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze, enhance and export a WAV file
    #[command(name = "enhance")]
    Enhance {
        /// Input WAV file
        input: PathBuf,

        /// Output path (defaults to <stem>_enhanced.wav next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        processing: ProcessingArgs,

        /// Show the decision without processing or writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Print quality metrics for a WAV file
    #[command(name = "analyze")]
    Analyze {
        /// Input WAV file
        input: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Enhance every WAV file under a directory
    #[command(name = "batch")]
    Batch {
        /// Directory to search recursively
        dir: PathBuf,

        /// Directory for enhanced files (defaults to each input's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Number of worker threads (defaults to ENHANCE_AUDIO_WORKERS or the CPU count)
        #[arg(short, long)]
        jobs: Option<usize>,

        #[command(flatten)]
        processing: ProcessingArgs,
    },
}

/// Flags shared by `enhance` and `batch`
#[derive(Args, Debug, Clone)]
pub struct ProcessingArgs {
    /// Processing intensity
    #[arg(short, long, value_enum, default_value_t = LevelArg::Auto)]
    pub quality: LevelArg,

    /// Never use the AI denoiser
    #[arg(long)]
    pub no_ai: bool,

    /// Keep more of the original dynamic range
    #[arg(short = 'd', long)]
    pub preserve_dynamics: bool,

    /// Integrated loudness target in LUFS
    #[arg(short = 'l', long, allow_negative_numbers = true)]
    pub target_lufs: Option<f32>,

    /// Print the run record as JSON
    #[arg(long)]
    pub json: bool,

    /// Overwrite existing output files
    #[arg(long)]
    pub force: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelArg {
    Auto,
    Minimal,
    Light,
    Standard,
    Aggressive,
}

impl LevelArg {
    pub fn level(self) -> Option<QualityLevel> {
        match self {
            LevelArg::Auto => None,
            LevelArg::Minimal => Some(QualityLevel::Minimal),
            LevelArg::Light => Some(QualityLevel::Light),
            LevelArg::Standard => Some(QualityLevel::Standard),
            LevelArg::Aggressive => Some(QualityLevel::Aggressive),
        }
    }
}

impl ProcessingArgs {
    /// User overrides; `ai_allowed` is false when the environment turned AI off
    pub fn overrides(&self, ai_allowed: bool) -> UserOverride {
        let mut overrides = UserOverride::default();
        if let Some(level) = self.quality.level() {
            overrides = overrides.with_level(level);
        }
        if self.no_ai || !ai_allowed {
            overrides = overrides.without_ai();
        }
        if self.preserve_dynamics {
            overrides = overrides.with_preserve_dynamics(true);
        }
        if let Some(lufs) = self.target_lufs {
            overrides = overrides.with_target_loudness(lufs);
        }
        overrides
    }
}
