//! Audio Engine Module
//!
//! Buffers and everything that moves them in and out of the pipeline:
//! - Audio buffer type and level helpers
//! - WAV loading and export
//! - Chunked processing for long files
//! - Sample rate conversion for fixed-rate models

pub mod buffer;
pub mod chunk;
pub mod io;
pub mod resample;

pub use buffer::{db_to_linear, linear_to_db, AudioBuffer, ChannelLayout};
pub use chunk::process_chunked;
pub use io::{default_output_path, export_wav, generate_test_tone, load_wav, ExportOptions};
pub use resample::resample;
