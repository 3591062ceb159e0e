//! AI Noise Reduction Models
//!
//! The pipeline reaches AI denoising only through [`ModelProvider`], which
//! may or may not hold a model. Absence or failure of the model is never
//! fatal: the noise-reduction stage falls back to spectral gating.

pub mod mock;
pub mod model;
pub mod provider;
#[cfg(feature = "rnnoise")]
pub mod rnnoise;

pub use model::DenoiseModel;
pub use provider::ModelProvider;
#[cfg(feature = "rnnoise")]
pub use rnnoise::RnnoiseModel;
