//! Enhance Audio - Quality-Adaptive Enhancement Pipeline
//!
//! Measures how good a recording already is, picks a processing intensity
//! from that measurement and applies only as much enhancement as needed.
//!
//! # Architecture
//!
//! - [`analysis`]: objective quality metrics and the composite score
//! - [`pipeline`]: decision engine, noise reduction, spectral shaping,
//!   dynamics, output validation and the orchestrator tying them together
//! - [`neural`]: AI denoiser behind a shared [`neural::ModelProvider`]
//! - [`dsp`]: filters, gates, compressor, limiter and loudness metering
//! - [`engine`]: sample buffers, WAV I/O and chunked processing
//!
//! A run never makes audio worse: if the output scores below the input the
//! original samples are returned.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod neural;
pub mod pipeline;

pub use analysis::{analyze, QualityMetrics};
pub use config::{EnhancementConfig, QualityLevel, Settings};
pub use engine::AudioBuffer;
pub use error::{EnhanceError, Result};
pub use pipeline::{Pipeline, ProcessingResult, UserOverride};
