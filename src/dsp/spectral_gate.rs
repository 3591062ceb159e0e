//! Spectral Gating Noise Reduction
//!
//! Offline STFT noise gate. The noise floor of every frequency bin is
//! estimated from the quiet frames of the recording itself, then each
//! time-frequency cell is attenuated by a Wiener-style gain with a fixed
//! floor so the result never sounds fully hollow.
//!
//! Long recordings are processed in 30 s chunks with a 1 s crossfade.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::Serialize;
use serde_json::json;

use super::Processor;
use crate::analysis::spectrum::hann_window;
use crate::engine::{db_to_linear, process_chunked, AudioBuffer};
use crate::error::{EnhanceError, Result};

// ============================================================================
// Constants
// ============================================================================

const STAGE: &str = "spectral_gating";

pub const DEFAULT_FFT_SIZE: usize = 2048;
pub const DEFAULT_HOP: usize = 512;

/// Percentile of frame power used as the raw noise estimate
const NOISE_PERCENTILE: f64 = 0.10;

/// 10th percentile of an exponential distribution relative to its mean: -ln(0.9)
const PERCENTILE_BIAS: f32 = 0.105_360_5;

/// Half-width (bins) of the median filter across frequency
const FREQ_MEDIAN_RADIUS: usize = 16;

/// Smoothing of gains from one frame to the next
const TIME_SMOOTHING: f32 = 0.5;

const POWER_EPSILON: f32 = 1e-20;

const CHUNK_SECS: u32 = 30;
const CHUNK_OVERLAP_SECS: u32 = 1;

// ============================================================================
// Parameters
// ============================================================================

/// Spectral gate parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GateParams {
    /// Reduction strength (0.0 = passthrough, 1.0 = strongest)
    pub strength: f32,
    pub fft_size: usize,
    pub hop: usize,
}

impl Default for GateParams {
    fn default() -> Self {
        Self {
            strength: 0.5,
            fft_size: DEFAULT_FFT_SIZE,
            hop: DEFAULT_HOP,
        }
    }
}

impl GateParams {
    pub fn with_strength(strength: f32) -> Self {
        Self {
            strength,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(EnhanceError::InvalidParameter {
                param: "strength".to_string(),
                value: self.strength.to_string(),
                expected: "0.0 to 1.0".to_string(),
            });
        }
        if self.fft_size < 64 || !self.fft_size.is_power_of_two() {
            return Err(EnhanceError::InvalidParameter {
                param: "fft_size".to_string(),
                value: self.fft_size.to_string(),
                expected: "power of two >= 64".to_string(),
            });
        }
        if self.hop == 0 || self.hop > self.fft_size / 2 {
            return Err(EnhanceError::InvalidParameter {
                param: "hop".to_string(),
                value: self.hop.to_string(),
                expected: format!("1 to {}", self.fft_size / 2),
            });
        }
        Ok(())
    }

    /// Over-subtraction factor applied to the noise estimate
    pub fn oversubtraction(&self) -> f32 {
        1.0 + 3.0 * self.strength
    }

    /// Lowest gain any cell can receive, in dB
    pub fn floor_db(&self) -> f32 {
        -(6.0 + 18.0 * self.strength)
    }
}

// ============================================================================
// Spectral Gate
// ============================================================================

pub struct SpectralGate {
    params: GateParams,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for SpectralGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralGate")
            .field("params", &self.params)
            .finish()
    }
}

impl SpectralGate {
    pub fn new(params: GateParams) -> Result<Self> {
        params.validate()?;
        let mut planner = FftPlanner::new();
        Ok(Self {
            window: hann_window(params.fft_size),
            forward: planner.plan_fft_forward(params.fft_size),
            inverse: planner.plan_fft_inverse(params.fft_size),
            params,
        })
    }

    pub fn params(&self) -> &GateParams {
        &self.params
    }

    fn gate_buffer(&self, chunk: &AudioBuffer) -> Result<AudioBuffer> {
        let channels = chunk
            .channel_data()
            .iter()
            .map(|ch| self.gate_channel(ch))
            .collect();
        chunk.with_samples(channels)
    }

    fn gate_channel(&self, samples: &[f32]) -> Vec<f32> {
        let n = self.params.fft_size;
        let hop = self.params.hop;
        let bins = n / 2 + 1;

        // Zero padding on both sides so every real sample sees full window overlap
        let mut padded = vec![0.0_f32; samples.len() + 2 * n];
        padded[n..n + samples.len()].copy_from_slice(samples);
        let num_frames = (padded.len() - n) / hop + 1;

        // Analysis
        let mut spectra: Vec<Vec<Complex<f32>>> = Vec::with_capacity(num_frames);
        let mut buf = vec![Complex::new(0.0, 0.0); n];
        for frame in 0..num_frames {
            let start = frame * hop;
            for (i, slot) in buf.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + i] * self.window[i], 0.0);
            }
            self.forward.process(&mut buf);
            spectra.push(buf[..bins].to_vec());
        }

        // Frames lying fully inside the signal; padded edges would bias the percentile low
        let interior = (n.div_ceil(hop)..num_frames)
            .take_while(|f| f * hop <= samples.len())
            .collect::<Vec<_>>();
        let noise = if interior.is_empty() {
            estimate_noise(&spectra, bins)
        } else {
            let inner: Vec<&[Complex<f32>]> =
                interior.iter().map(|&f| spectra[f].as_slice()).collect();
            estimate_noise(&inner, bins)
        };
        let alpha = self.params.oversubtraction();
        let floor = db_to_linear(self.params.floor_db());

        // Gains, smoothed over time
        let mut prev: Option<Vec<f32>> = None;
        for spectrum in spectra.iter_mut() {
            let mut gains: Vec<f32> = spectrum
                .iter()
                .zip(&noise)
                .map(|(c, &nk)| {
                    let power = c.norm_sqr().max(POWER_EPSILON);
                    (1.0 - alpha * nk / power).max(0.0).sqrt().max(floor)
                })
                .collect();
            if let Some(p) = &prev {
                for (g, &pg) in gains.iter_mut().zip(p) {
                    *g = TIME_SMOOTHING * pg + (1.0 - TIME_SMOOTHING) * *g;
                }
            }
            for (c, &g) in spectrum.iter_mut().zip(&gains) {
                *c *= g;
            }
            prev = Some(gains);
        }

        // Synthesis (weighted overlap-add)
        let mut out = vec![0.0_f32; padded.len()];
        let mut norm = vec![0.0_f32; padded.len()];
        let scale = 1.0 / n as f32;
        for (frame, spectrum) in spectra.iter().enumerate() {
            buf[..bins].copy_from_slice(spectrum);
            for k in 1..n / 2 {
                buf[n - k] = spectrum[k].conj();
            }
            self.inverse.process(&mut buf);

            let start = frame * hop;
            for i in 0..n {
                let w = self.window[i];
                out[start + i] += buf[i].re * scale * w;
                norm[start + i] += w * w;
            }
        }

        out[n..n + samples.len()]
            .iter()
            .zip(&norm[n..n + samples.len()])
            .map(|(&y, &w)| if w > 1e-8 { y / w } else { 0.0 })
            .collect()
    }
}

/// Per-bin noise power: bias-corrected low percentile over time, capped by
/// the median of neighbouring bins so stationary tones are not learned as noise
fn estimate_noise<S: AsRef<[Complex<f32>]>>(spectra: &[S], bins: usize) -> Vec<f32> {
    let mut column = Vec::with_capacity(spectra.len());
    let temporal: Vec<f32> = (0..bins)
        .map(|k| {
            column.clear();
            column.extend(spectra.iter().map(|s| s.as_ref()[k].norm_sqr()));
            let idx = ((column.len() - 1) as f64 * NOISE_PERCENTILE).round() as usize;
            let (_, value, _) = column.select_nth_unstable_by(idx, f32::total_cmp);
            *value / PERCENTILE_BIAS
        })
        .collect();

    let mut window = Vec::with_capacity(2 * FREQ_MEDIAN_RADIUS + 1);
    (0..bins)
        .map(|k| {
            let lo = k.saturating_sub(FREQ_MEDIAN_RADIUS);
            let hi = (k + FREQ_MEDIAN_RADIUS).min(bins - 1);
            window.clear();
            window.extend_from_slice(&temporal[lo..=hi]);
            let mid = window.len() / 2;
            let (_, median, _) = window.select_nth_unstable_by(mid, f32::total_cmp);
            temporal[k].min(*median)
        })
        .collect()
}

impl Processor for SpectralGate {
    fn name(&self) -> &'static str {
        "spectral_gate"
    }

    fn process(&mut self, input: &AudioBuffer) -> Result<AudioBuffer> {
        if !input.is_finite() {
            return Err(EnhanceError::processing(STAGE, "input contains NaN or infinite samples"));
        }
        if self.params.strength <= 0.0 || input.is_empty() {
            return Ok(input.clone());
        }

        let sr = input.sample_rate() as usize;
        let output = process_chunked(
            input,
            CHUNK_SECS as usize * sr,
            CHUNK_OVERLAP_SECS as usize * sr,
            |chunk| self.gate_buffer(chunk),
        )?;

        if !output.is_finite() {
            return Err(EnhanceError::processing(STAGE, "gate produced non-finite samples"));
        }
        Ok(output)
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "strength": self.params.strength,
            "fft_size": self.params.fft_size,
            "hop": self.params.hop,
            "oversubtraction": self.params.oversubtraction(),
            "floor_db": self.params.floor_db(),
        })
    }
}
