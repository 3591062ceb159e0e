//! Audio Buffer Management
//!
//! Provides the core audio buffer type shared by every pipeline stage.
//! Samples are stored non-interleaved as 32-bit floats, one Vec per channel.

use sha2::{Digest, Sha256};

use crate::error::{EnhanceError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Bit depth assumed for buffers that were not decoded from a file
pub const DEFAULT_BIT_DEPTH: u16 = 32;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    #[default]
    Mono,
    /// Two channels (stereo: left, right)
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Decoded audio handed from stage to stage
///
/// Construction validates the shape: one or two channels of equal length and
/// a positive sample rate. Processing never mutates a buffer in place; every
/// stage builds a new one with [`AudioBuffer::with_samples`].
///
/// # Example
/// ```
/// use enhance_audio::engine::AudioBuffer;
///
/// let buffer = AudioBuffer::from_channels(vec![vec![0.0; 4800]], 48_000).unwrap();
/// assert_eq!(buffer.channels(), 1);
/// assert_eq!(buffer.len(), 4800);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<Vec<f32>>,
    sample_rate: u32,
    bit_depth: u16,
}

impl AudioBuffer {
    /// Create a zeroed buffer with the given layout
    pub fn silent(num_samples: usize, layout: ChannelLayout, sample_rate: u32) -> Result<Self> {
        Self::from_channels(
            vec![vec![0.0_f32; num_samples]; layout.num_channels()],
            sample_rate,
        )
    }

    /// Create a buffer from per-channel sample vectors
    ///
    /// # Errors
    /// * `UnsupportedChannels` - zero or more than two channels
    /// * `InvalidFormat` - mismatched channel lengths or a zero sample rate
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if ChannelLayout::from_count(samples.len()).is_none() {
            return Err(EnhanceError::UnsupportedChannels {
                channels: samples.len(),
            });
        }
        if sample_rate == 0 {
            return Err(EnhanceError::InvalidFormat {
                reason: "sample rate must be positive".to_string(),
            });
        }
        let len = samples[0].len();
        if samples.iter().any(|ch| ch.len() != len) {
            return Err(EnhanceError::InvalidFormat {
                reason: "channels have different lengths".to_string(),
            });
        }

        Ok(Self {
            samples,
            sample_rate,
            bit_depth: DEFAULT_BIT_DEPTH,
        })
    }

    /// Create an audio buffer from interleaved sample data
    ///
    /// # Arguments
    /// * `interleaved` - Interleaved sample data (L, R, L, R, ... for stereo)
    /// * `layout` - Channel configuration
    /// * `sample_rate` - Sample rate in Hz
    pub fn from_interleaved(
        interleaved: &[f32],
        layout: ChannelLayout,
        sample_rate: u32,
    ) -> Result<Self> {
        let num_channels = layout.num_channels();

        if interleaved.len() % num_channels != 0 {
            return Err(EnhanceError::InvalidFormat {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
            });
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Self::from_channels(samples, sample_rate)
    }

    /// Set the informational bit depth (builder style)
    pub fn with_bit_depth(mut self, bit_depth: u16) -> Self {
        self.bit_depth = bit_depth;
        self
    }

    /// Build a new buffer with the same rate and bit depth but new samples
    pub fn with_samples(&self, samples: Vec<Vec<f32>>) -> Result<Self> {
        Ok(Self::from_channels(samples, self.sample_rate)?.with_bit_depth(self.bit_depth))
    }

    /// Convert the buffer to interleaved format
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.channels() * self.len());
        for sample_idx in 0..self.len() {
            for channel in &self.samples {
                interleaved.push(channel[sample_idx]);
            }
        }
        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer is empty (no samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn bit_depth(&self) -> u16 {
        self.bit_depth
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    /// Get the channel layout
    pub fn layout(&self) -> ChannelLayout {
        if self.channels() == 2 {
            ChannelLayout::Stereo
        } else {
            ChannelLayout::Mono
        }
    }

    /// Samples of one channel
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// All channels, non-interleaved
    #[inline]
    pub fn channel_data(&self) -> &[Vec<f32>] {
        &self.samples
    }

    /// Iterate over every sample of every channel
    pub fn iter_samples(&self) -> impl Iterator<Item = f32> + '_ {
        self.samples.iter().flat_map(|ch| ch.iter().copied())
    }

    /// Average of all channels
    pub fn mono_mix(&self) -> Vec<f32> {
        match self.samples.as_slice() {
            [mono] => mono.clone(),
            [left, right] => left
                .iter()
                .zip(right.iter())
                .map(|(l, r)| 0.5 * (l + r))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Absolute peak over all channels (linear)
    pub fn peak(&self) -> f32 {
        self.iter_samples().map(f32::abs).fold(0.0_f32, f32::max)
    }

    /// RMS over all channels (linear), 0.0 for empty buffers
    pub fn rms(&self) -> f32 {
        let total = self.channels() * self.len();
        if total == 0 {
            return 0.0;
        }
        let sum_squares: f64 = self.iter_samples().map(|s| (s as f64) * (s as f64)).sum();
        (sum_squares / total as f64).sqrt() as f32
    }

    /// True when no sample is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.iter_samples().all(f32::is_finite)
    }

    /// Return a copy with every sample multiplied by `gain`
    pub fn scaled(&self, gain: f32) -> Result<Self> {
        self.with_samples(
            self.samples
                .iter()
                .map(|ch| ch.iter().map(|s| s * gain).collect())
                .collect(),
        )
    }

    /// SHA-256 of the channel count, sample rate and raw sample bits
    ///
    /// Identical buffers always produce identical fingerprints, so reports can
    /// show whether two stages produced the same audio without embedding it.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.channels() as u32).to_le_bytes());
        hasher.update(self.sample_rate.to_le_bytes());
        for channel in &self.samples {
            for sample in channel {
                hasher.update(sample.to_bits().to_le_bytes());
            }
        }
        hasher
            .finalize()
            .iter()
            .take(8)
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_channels_rejects_bad_shapes() {
        let err = AudioBuffer::from_channels(vec![vec![0.0; 4]; 3], 44100).unwrap_err();
        assert!(matches!(err, EnhanceError::UnsupportedChannels { channels: 3 }));

        let err = AudioBuffer::from_channels(vec![vec![0.0; 4], vec![0.0; 5]], 44100).unwrap_err();
        assert!(matches!(err, EnhanceError::InvalidFormat { .. }));

        let err = AudioBuffer::from_channels(vec![vec![0.0; 4]], 0).unwrap_err();
        assert!(matches!(err, EnhanceError::InvalidFormat { .. }));
    }

    #[test]
    fn test_interleave_roundtrip() {
        let data = vec![1.0, 5.0, 2.0, 6.0, 3.0, 7.0];
        let buffer = AudioBuffer::from_interleaved(&data, ChannelLayout::Stereo, 48000).unwrap();
        assert_eq!(buffer.channel(0), &[1.0, 2.0, 3.0]);
        assert_eq!(buffer.channel(1), &[5.0, 6.0, 7.0]);
        assert_eq!(buffer.to_interleaved(), data);
    }

    #[test]
    fn test_levels() {
        let buffer = AudioBuffer::from_channels(vec![vec![0.5, -0.5, 0.5, -0.5]], 8000).unwrap();
        assert_relative_eq!(buffer.peak(), 0.5);
        assert_relative_eq!(buffer.rms(), 0.5, epsilon = 1e-6);
        assert_relative_eq!(linear_to_db(db_to_linear(-6.0)), -6.0, epsilon = 1e-4);
    }

    #[test]
    fn test_mono_mix_averages_channels() {
        let buffer =
            AudioBuffer::from_channels(vec![vec![1.0, 0.0], vec![0.0, -1.0]], 8000).unwrap();
        assert_eq!(buffer.mono_mix(), vec![0.5, -0.5]);
    }

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        let a = AudioBuffer::from_channels(vec![vec![0.1, 0.2, 0.3]], 8000).unwrap();
        let b = a.clone();
        let c = a.scaled(0.5).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }

    #[test]
    fn test_with_samples_keeps_metadata() {
        let a = AudioBuffer::from_channels(vec![vec![0.0; 8]], 22050)
            .unwrap()
            .with_bit_depth(16);
        let b = a.with_samples(vec![vec![1.0; 8]]).unwrap();
        assert_eq!(b.sample_rate(), 22050);
        assert_eq!(b.bit_depth(), 16);
    }
}
