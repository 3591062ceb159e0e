//! Biquad Equalizer
//!
//! Cascaded biquad filters with Audio EQ Cookbook coefficients. Bands whose
//! frequency is at or above Nyquist are dropped when the equalizer is built.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::f64::consts::PI;

use super::Processor;
use crate::engine::AudioBuffer;
use crate::error::{EnhanceError, Result};

/// Filter type for EQ bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Bell curve boost/cut
    #[default]
    Peak,
    /// Boost/cut below frequency
    LowShelf,
    /// Boost/cut above frequency
    HighShelf,
    /// Remove below frequency (high-pass filter)
    HighPass,
}

/// Biquad filter coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, Default)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    /// Calculate biquad coefficients using Audio EQ Cookbook formulas
    /// Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html
    fn calculate(filter_type: FilterType, sample_rate: f64, frequency: f64, gain_db: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * frequency / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);
        let a = 10.0_f64.powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match filter_type {
            FilterType::Peak => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterType::LowShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterType::HighShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterType::HighPass => (
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
        };

        // Normalize by a0
        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Magnitude response in dB at `frequency`
    fn response_db(&self, frequency: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * frequency / sample_rate;
        let (c1, s1, c2, s2) = (w.cos(), w.sin(), (2.0 * w).cos(), (2.0 * w).sin());
        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);
        let num = (num_re * num_re + num_im * num_im).sqrt();
        let den = (den_re * den_re + den_im * den_im).sqrt();
        20.0 * (num / den).log10()
    }
}

/// Biquad filter state for one channel
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    /// Direct Form I
    fn process(&mut self, input: f64, coeffs: &BiquadCoeffs) -> f64 {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// Single EQ band configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    /// Center/corner frequency in Hz
    pub frequency: f32,
    /// Gain in dB (-24 to +24, ignored by high-pass)
    pub gain_db: f32,
    /// Q factor (0.1 to 10.0)
    pub q: f32,
    pub filter_type: FilterType,
}

impl EqBand {
    pub fn peak(frequency: f32, gain_db: f32, q: f32) -> Self {
        Self {
            frequency,
            gain_db,
            q,
            filter_type: FilterType::Peak,
        }
    }

    pub fn low_shelf(frequency: f32, gain_db: f32) -> Self {
        Self {
            frequency,
            gain_db,
            q: std::f32::consts::FRAC_1_SQRT_2,
            filter_type: FilterType::LowShelf,
        }
    }

    pub fn high_shelf(frequency: f32, gain_db: f32) -> Self {
        Self {
            frequency,
            gain_db,
            q: std::f32::consts::FRAC_1_SQRT_2,
            filter_type: FilterType::HighShelf,
        }
    }

    pub fn high_pass(frequency: f32) -> Self {
        Self {
            frequency,
            gain_db: 0.0,
            q: std::f32::consts::FRAC_1_SQRT_2,
            filter_type: FilterType::HighPass,
        }
    }

    /// Validate band parameters
    pub fn validate(&self) -> Result<()> {
        if self.frequency.is_nan() || self.frequency <= 0.0 {
            return Err(EnhanceError::InvalidParameter {
                param: "frequency".to_string(),
                value: self.frequency.to_string(),
                expected: "a positive frequency in Hz".to_string(),
            });
        }
        if !(-24.0..=24.0).contains(&self.gain_db) {
            return Err(EnhanceError::InvalidParameter {
                param: "gain_db".to_string(),
                value: self.gain_db.to_string(),
                expected: "-24 to +24 dB".to_string(),
            });
        }
        if !(0.1..=10.0).contains(&self.q) {
            return Err(EnhanceError::InvalidParameter {
                param: "q".to_string(),
                value: self.q.to_string(),
                expected: "0.1 to 10.0".to_string(),
            });
        }
        Ok(())
    }

    /// Boost/cut bands with (near) zero gain have no effect
    fn is_bypass(&self) -> bool {
        match self.filter_type {
            FilterType::Peak | FilterType::LowShelf | FilterType::HighShelf => {
                self.gain_db.abs() < 0.01
            }
            FilterType::HighPass => false,
        }
    }
}

/// Cascade of biquad bands for one sample rate
#[derive(Debug, Clone)]
pub struct Equalizer {
    bands: Vec<EqBand>,
    coeffs: Vec<BiquadCoeffs>,
    skipped: Vec<EqBand>,
    sample_rate: u32,
    // [band][channel]
    states: Vec<Vec<BiquadState>>,
}

impl Equalizer {
    /// Build an equalizer, dropping bypass bands and bands at or above Nyquist
    pub fn new(bands: Vec<EqBand>, sample_rate: u32) -> Result<Self> {
        let nyquist = sample_rate as f32 / 2.0;
        let mut active = Vec::new();
        let mut skipped = Vec::new();

        for band in bands {
            band.validate()?;
            if band.frequency >= nyquist {
                skipped.push(band);
            } else if !band.is_bypass() {
                active.push(band);
            }
        }

        let coeffs = active
            .iter()
            .map(|b| {
                BiquadCoeffs::calculate(
                    b.filter_type,
                    sample_rate as f64,
                    b.frequency as f64,
                    b.gain_db as f64,
                    b.q as f64,
                )
            })
            .collect();

        Ok(Self {
            bands: active,
            coeffs,
            skipped,
            sample_rate,
            states: Vec::new(),
        })
    }

    /// Bands that will be applied
    pub fn bands(&self) -> &[EqBand] {
        &self.bands
    }

    /// Bands dropped because they sit at or above Nyquist
    pub fn skipped(&self) -> &[EqBand] {
        &self.skipped
    }

    /// Combined magnitude response of the cascade in dB
    pub fn response_db(&self, frequency: f32) -> f64 {
        self.coeffs
            .iter()
            .map(|c| c.response_db(frequency as f64, self.sample_rate as f64))
            .sum()
    }
}

impl Processor for Equalizer {
    fn name(&self) -> &'static str {
        "equalizer"
    }

    fn process(&mut self, input: &AudioBuffer) -> Result<AudioBuffer> {
        if input.sample_rate() != self.sample_rate {
            return Err(EnhanceError::InvalidParameter {
                param: "sample_rate".to_string(),
                value: input.sample_rate().to_string(),
                expected: format!("{} Hz (equalizer design rate)", self.sample_rate),
            });
        }

        if self.states.len() != self.coeffs.len()
            || self.states.iter().any(|s| s.len() != input.channels())
        {
            self.states = vec![vec![BiquadState::default(); input.channels()]; self.coeffs.len()];
        }

        let output = input
            .channel_data()
            .iter()
            .enumerate()
            .map(|(ch, samples)| {
                samples
                    .iter()
                    .map(|&s| {
                        let mut y = s as f64;
                        for (coeffs, band_states) in self.coeffs.iter().zip(self.states.iter_mut()) {
                            y = band_states[ch].process(y, coeffs);
                        }
                        y as f32
                    })
                    .collect()
            })
            .collect();

        input.with_samples(output)
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "bands": self.bands,
            "skipped_above_nyquist": self.skipped,
        })
    }
}
