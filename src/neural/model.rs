//! Denoise model trait
//!
//! Defines the interface every AI noise-reduction backend implements.

use crate::engine::AudioBuffer;
use crate::error::Result;

/// An AI noise-reduction model
///
/// Implementations may keep internal state between calls; the provider
/// guarantees exclusive access while `denoise` runs.
pub trait DenoiseModel: Send {
    /// Model identifier used in stage parameters and logs
    fn name(&self) -> &str;

    /// Return a denoised copy of `input`
    ///
    /// `strength` is in `0.0..=1.0`; 0.0 must return the input unchanged and
    /// 1.0 the fully processed signal. The result must have the same channel
    /// count, length and sample rate as the input.
    fn denoise(&mut self, input: &AudioBuffer, strength: f32) -> Result<AudioBuffer>;
}

/// Blend `processed` into `original` by `strength`
pub fn blend(original: &[f32], processed: &[f32], strength: f32) -> Vec<f32> {
    original
        .iter()
        .zip(processed)
        .map(|(o, p)| o * (1.0 - strength) + p * strength)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_endpoints() {
        let a = [1.0, -1.0, 0.5];
        let b = [0.0, 0.0, 0.0];
        assert_eq!(blend(&a, &b, 0.0), a.to_vec());
        assert_eq!(blend(&a, &b, 1.0), b.to_vec());
        assert_eq!(blend(&a, &b, 0.5), vec![0.5, -0.5, 0.25]);
    }
}
