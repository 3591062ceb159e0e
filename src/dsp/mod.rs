//! DSP Building Blocks
//!
//! Signal processors used by the pipeline stages. Each processor consumes a
//! buffer and returns a new one, leaving its input untouched.

mod compressor;
mod eq;
mod limiter;
pub mod loudness;
mod spectral_gate;

pub use compressor::{Compressor, CompressorParams};
pub use eq::{EqBand, Equalizer, FilterType};
pub use limiter::{Limiter, DEFAULT_CEILING_DB};
pub use loudness::{integrated_loudness, LoudnessMeasurement, LoudnessMethod};
pub use spectral_gate::{GateParams, SpectralGate};

use crate::engine::AudioBuffer;
use crate::error::Result;

/// Common interface for buffer-to-buffer processors
pub trait Processor: Send {
    /// Short identifier used in stage parameters and logs
    fn name(&self) -> &'static str;

    /// Produce a processed copy of `input`
    fn process(&mut self, input: &AudioBuffer) -> Result<AudioBuffer>;

    /// Parameters as JSON (for stage reports)
    fn parameters(&self) -> serde_json::Value;
}
