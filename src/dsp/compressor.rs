//! Compressor
//!
//! Feed-forward, stereo-linked peak compressor with a soft knee, one-pole
//! attack/release smoothing and a cap on the deepest gain reduction.

use serde::{Deserialize, Serialize};

use super::Processor;
use crate::engine::{db_to_linear, linear_to_db, AudioBuffer};
use crate::error::{EnhanceError, Result};

/// Compressor parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressorParams {
    /// Threshold level in dB (-60 to 0 dB)
    pub threshold_db: f32,
    /// Compression ratio (1.0 to 20.0)
    pub ratio: f32,
    /// Attack time in milliseconds (0.1 to 100 ms)
    pub attack_ms: f32,
    /// Release time in milliseconds (10 to 1000 ms)
    pub release_ms: f32,
    /// Knee width in dB (0 = hard knee, up to 12 dB)
    pub knee_db: f32,
    /// Deepest gain reduction the compressor may apply (dB, positive)
    pub max_reduction_db: f32,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self::gentle()
    }
}

impl CompressorParams {
    /// Light leveling that leaves most of the dynamics intact
    pub fn gentle() -> Self {
        Self {
            threshold_db: -18.0,
            ratio: 2.0,
            attack_ms: 10.0,
            release_ms: 100.0,
            knee_db: 6.0,
            max_reduction_db: 6.0,
        }
    }

    /// Heavier leveling for uneven recordings
    pub fn firm() -> Self {
        Self {
            threshold_db: -24.0,
            ratio: 4.0,
            attack_ms: 5.0,
            release_ms: 50.0,
            knee_db: 3.0,
            max_reduction_db: 20.0,
        }
    }

    /// Validate parameters against their ranges
    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, f32, f32, f32, &str); 6] = [
            ("threshold_db", self.threshold_db, -60.0, 0.0, "-60 to 0 dB"),
            ("ratio", self.ratio, 1.0, 20.0, "1.0 to 20.0"),
            ("attack_ms", self.attack_ms, 0.1, 100.0, "0.1 to 100 ms"),
            ("release_ms", self.release_ms, 10.0, 1000.0, "10 to 1000 ms"),
            ("knee_db", self.knee_db, 0.0, 12.0, "0 to 12 dB"),
            ("max_reduction_db", self.max_reduction_db, 0.0, 40.0, "0 to 40 dB"),
        ];
        for (param, value, min, max, expected) in checks {
            if !(min..=max).contains(&value) {
                return Err(EnhanceError::InvalidParameter {
                    param: param.to_string(),
                    value: value.to_string(),
                    expected: expected.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Gain change in dB (zero or negative) for a detector level in dB
    ///
    /// Soft knee uses the quadratic interpolation between the unity line and
    /// the compression line, so the curve is continuous at both knee edges.
    pub fn gain_reduction_db(&self, input_db: f32) -> f32 {
        let over = input_db - self.threshold_db;
        let slope = 1.0 / self.ratio - 1.0;
        let half_knee = self.knee_db / 2.0;

        let reduction = if self.knee_db > 0.0 && over.abs() <= half_knee {
            slope * (over + half_knee).powi(2) / (2.0 * self.knee_db)
        } else if over > 0.0 {
            slope * over
        } else {
            0.0
        };

        reduction.max(-self.max_reduction_db)
    }
}

/// Compressor dynamics processor
#[derive(Debug, Clone)]
pub struct Compressor {
    params: CompressorParams,
    sample_rate: u32,
    attack_coeff: f32,
    release_coeff: f32,
    /// Current smoothed gain (linear), shared by all channels
    gain: f32,
    /// Deepest reduction applied since construction (dB, positive)
    peak_reduction_db: f32,
}

impl Compressor {
    pub fn new(params: CompressorParams, sample_rate: u32) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            sample_rate,
            attack_coeff: time_to_coeff(params.attack_ms, sample_rate),
            release_coeff: time_to_coeff(params.release_ms, sample_rate),
            gain: 1.0,
            peak_reduction_db: 0.0,
        })
    }

    pub fn params(&self) -> &CompressorParams {
        &self.params
    }

    /// Deepest gain reduction applied so far, in dB (positive)
    pub fn peak_reduction_db(&self) -> f32 {
        self.peak_reduction_db
    }
}

/// One-pole smoothing coefficient: exp(-1 / time_in_samples)
#[inline]
fn time_to_coeff(time_ms: f32, sample_rate: u32) -> f32 {
    let samples = time_ms / 1000.0 * sample_rate as f32;
    if samples > 0.0 {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}

impl Processor for Compressor {
    fn name(&self) -> &'static str {
        "compressor"
    }

    fn process(&mut self, input: &AudioBuffer) -> Result<AudioBuffer> {
        if input.sample_rate() != self.sample_rate {
            return Err(EnhanceError::InvalidParameter {
                param: "sample_rate".to_string(),
                value: input.sample_rate().to_string(),
                expected: format!("{} Hz (compressor design rate)", self.sample_rate),
            });
        }

        let channels = input.channel_data();
        let mut output: Vec<Vec<f32>> = channels
            .iter()
            .map(|ch| Vec::with_capacity(ch.len()))
            .collect();

        for frame in 0..input.len() {
            // Linked detection: loudest channel drives the shared gain
            let level = channels
                .iter()
                .map(|ch| ch[frame].abs())
                .fold(0.0_f32, f32::max);

            let target_db = if level > 0.0 {
                self.params.gain_reduction_db(linear_to_db(level))
            } else {
                0.0
            };
            let target = db_to_linear(target_db);

            let coeff = if target < self.gain {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.gain = coeff * self.gain + (1.0 - coeff) * target;
            self.peak_reduction_db = self.peak_reduction_db.max(-linear_to_db(self.gain));

            for (out, ch) in output.iter_mut().zip(channels) {
                out.push(ch[frame] * self.gain);
            }
        }

        input.with_samples(output)
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::to_value(self.params).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_gain_computer_hard_knee() {
        let params = CompressorParams {
            knee_db: 0.0,
            max_reduction_db: 40.0,
            ..CompressorParams::firm()
        };
        assert_eq!(params.gain_reduction_db(-30.0), 0.0);
        // 12 dB over at 4:1 leaves 3 dB over -> 9 dB reduction
        assert_abs_diff_eq!(params.gain_reduction_db(-12.0), -9.0, epsilon = 1e-4);
    }

    #[test]
    fn test_soft_knee_is_continuous() {
        let params = CompressorParams::gentle();
        let edge_low = params.threshold_db - params.knee_db / 2.0;
        let edge_high = params.threshold_db + params.knee_db / 2.0;
        assert_abs_diff_eq!(params.gain_reduction_db(edge_low), 0.0, epsilon = 1e-4);
        let inside = params.gain_reduction_db(edge_high - 1e-3);
        let outside = params.gain_reduction_db(edge_high + 1e-3);
        assert_abs_diff_eq!(inside, outside, epsilon = 1e-2);
    }

    #[test]
    fn test_reduction_is_capped() {
        let params = CompressorParams::gentle();
        assert_abs_diff_eq!(params.gain_reduction_db(0.0), -6.0, epsilon = 1e-6);
    }

    #[test]
    fn test_loud_signal_is_reduced_quiet_signal_untouched() {
        let sr = 16000;
        let loud = AudioBuffer::from_channels(vec![vec![0.9; sr as usize]], sr).unwrap();
        let mut comp = Compressor::new(CompressorParams::firm(), sr).unwrap();
        let out = comp.process(&loud).unwrap();
        assert!(out.channel(0)[sr as usize - 1] < 0.5);
        assert!(comp.peak_reduction_db() > 6.0);

        let quiet = AudioBuffer::from_channels(vec![vec![0.01; 1000]], sr).unwrap();
        let mut comp = Compressor::new(CompressorParams::firm(), sr).unwrap();
        let out = comp.process(&quiet).unwrap();
        assert_eq!(out, quiet);
    }

    #[test]
    fn test_stereo_channels_share_gain() {
        let sr = 8000;
        let input =
            AudioBuffer::from_channels(vec![vec![0.9; 4000], vec![0.1; 4000]], sr).unwrap();
        let mut comp = Compressor::new(CompressorParams::firm(), sr).unwrap();
        let out = comp.process(&input).unwrap();
        let ratio_l = out.channel(0)[3999] / 0.9;
        let ratio_r = out.channel(1)[3999] / 0.1;
        assert_abs_diff_eq!(ratio_l, ratio_r, epsilon = 1e-5);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = CompressorParams {
            ratio: 0.5,
            ..CompressorParams::gentle()
        };
        assert!(Compressor::new(params, 48000).is_err());
    }
}
