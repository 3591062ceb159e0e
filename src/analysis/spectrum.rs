//! FFT helpers shared by the analyzer and the spectral stages

use rustfft::{num_complex::Complex, FftPlanner};

/// Periodic Hann window of length `n`
pub fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos()))
        .collect()
}

/// Start offsets of analysis frames of `frame_len` with `hop`
///
/// A signal shorter than one frame still gets a single (zero-padded) frame,
/// and samples past the last full frame get one more zero-padded frame.
pub fn frame_starts(len: usize, frame_len: usize, hop: usize) -> Vec<usize> {
    if len <= frame_len {
        return vec![0];
    }
    let mut starts: Vec<usize> = (0..=(len - frame_len) / hop).map(|i| i * hop).collect();
    if let Some(&last) = starts.last() {
        if last + frame_len < len {
            starts.push(last + hop);
        }
    }
    starts
}

/// Magnitude spectra (bins `0..=n/2`) of Hann-windowed frames
pub struct FrameSpectra<'a> {
    samples: &'a [f32],
    window: Vec<f32>,
    fft: std::sync::Arc<dyn rustfft::Fft<f32>>,
    starts: std::vec::IntoIter<usize>,
    scratch: Vec<Complex<f32>>,
}

impl<'a> FrameSpectra<'a> {
    pub fn new(samples: &'a [f32], fft_size: usize, hop: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            samples,
            window: hann_window(fft_size),
            fft: planner.plan_fft_forward(fft_size),
            starts: frame_starts(samples.len(), fft_size, hop).into_iter(),
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }
}

impl Iterator for FrameSpectra<'_> {
    type Item = Vec<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.starts.next()?;
        let n = self.window.len();
        for (i, slot) in self.scratch.iter_mut().enumerate() {
            let sample = self.samples.get(start + i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);
        Some(self.scratch[..=n / 2].iter().map(|c| c.norm()).collect())
    }
}

/// Welch power spectral density estimate (bins `0..=n/2`, 50% overlap)
pub fn welch_psd(samples: &[f32], fft_size: usize) -> Vec<f64> {
    let mut psd = vec![0.0_f64; fft_size / 2 + 1];
    let mut frames = 0usize;
    for magnitudes in FrameSpectra::new(samples, fft_size, fft_size / 2) {
        for (acc, m) in psd.iter_mut().zip(magnitudes) {
            *acc += (m as f64) * (m as f64);
        }
        frames += 1;
    }
    if frames > 0 {
        for p in psd.iter_mut() {
            *p /= frames as f64;
        }
    }
    psd
}

/// Mean power of PSD bins whose center frequency lies in `[low_hz, high_hz)`
pub fn band_power(psd: &[f64], sample_rate: u32, low_hz: f64, high_hz: f64) -> f64 {
    let fft_size = (psd.len() - 1) * 2;
    let bin_hz = sample_rate as f64 / fft_size as f64;
    let (sum, count) = psd
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            let f = *i as f64 * bin_hz;
            f >= low_hz && f < high_hz
        })
        .fold((0.0, 0usize), |(s, c), (_, p)| (s + p, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_starts() {
        assert_eq!(frame_starts(100, 2048, 512), vec![0]);
        assert_eq!(frame_starts(2048 + 1024, 2048, 512), vec![0, 512, 1024]);
        assert_eq!(frame_starts(2048 + 1100, 2048, 512), vec![0, 512, 1024, 1536]);
    }

    #[test]
    fn test_tail_after_last_full_frame_is_analyzed() {
        // Full frames end at 4096; the tone lives only in the 600 samples after
        let sr = 8000.0_f32;
        let samples: Vec<f32> = (0..4096 + 600)
            .map(|i| {
                if i < 4096 {
                    0.0
                } else {
                    (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sr).sin()
                }
            })
            .collect();

        let psd = welch_psd(&samples, 2048);
        assert!(band_power(&psd, 8000, 900.0, 1100.0) > 1.0);
        assert_eq!(FrameSpectra::new(&samples, 2048, 1024).count(), 4);
    }

    #[test]
    fn test_sine_peaks_at_expected_bin() {
        let sr = 8000.0_f32;
        let samples: Vec<f32> = (0..4096)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sr).sin())
            .collect();
        let psd = welch_psd(&samples, 1024);
        let peak_bin = psd
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        // 1000 Hz at 8000/1024 Hz per bin
        assert_eq!(peak_bin, 128);

        let in_band = band_power(&psd, 8000, 900.0, 1100.0);
        let out_band = band_power(&psd, 8000, 2000.0, 3000.0);
        assert!(in_band > out_band * 1e4);
    }
}
