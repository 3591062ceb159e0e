//! Quality metrics snapshot and composite score
//!
//! The composite score is a fixed weighted sum of per-metric sub-scores. Every
//! sub-score is monotonic in its metric so the composite is too.

use serde::{Deserialize, Serialize};

/// Weights of the composite quality score (sum to 1.0)
pub mod weights {
    pub const SNR: f64 = 0.35;
    pub const FLATNESS: f64 = 0.20;
    pub const DYNAMIC_RANGE: f64 = 0.20;
    pub const CLIPPING: f64 = 0.20;
    pub const SILENCE: f64 = 0.05;
}

/// Policy thresholds derived from the score
pub mod thresholds {
    /// Below this score the recording benefits from neural denoising
    pub const NEEDS_AI_SCORE: f64 = 0.5;
    /// Below this SNR the recording benefits from neural denoising
    pub const NEEDS_AI_SNR_DB: f64 = 20.0;
    /// Above this score the recording is already high quality
    pub const HIGH_QUALITY_SCORE: f64 = 0.8;
}

/// SNR at which the SNR sub-score saturates
const SNR_FULL_SCORE_DB: f64 = 40.0;
/// Flatness at which the flatness sub-score reaches zero
const FLATNESS_ZERO_SCORE: f64 = 0.5;
/// Peak-to-RMS spread at which the dynamic range sub-score saturates
const DYNAMIC_RANGE_FULL_SCORE_DB: f64 = 6.0;
/// Clipping ratio at which the clipping sub-score reaches zero (1%)
const CLIPPING_ZERO_SCORE: f64 = 0.01;
/// Recordings that are mostly silence get half the silence sub-score
const MOSTLY_SILENT_RATIO: f64 = 0.9;

/// Objective quality measurements of one buffer
///
/// A read-only snapshot, recomputed before and after processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Estimated signal-to-noise ratio in dB, clamped to [0, 60]
    pub snr_db: f64,
    /// Geometric over arithmetic mean of the magnitude spectrum (0 tonal, 1 noise)
    pub spectral_flatness: f64,
    /// Peak-to-RMS spread in dB (0 for silence)
    pub dynamic_range_db: f64,
    /// Fraction of samples at or near full scale
    pub clipping_ratio: f64,
    /// Fraction of 20 ms frames below the silence threshold
    pub silence_ratio: f64,
    /// Weighted composite in [0, 1]
    pub quality_score: f64,
}

/// Human-readable quality band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityLabel {
    Poor,
    Medium,
    Good,
    Excellent,
}

impl std::fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            QualityLabel::Poor => "Poor",
            QualityLabel::Medium => "Medium",
            QualityLabel::Good => "Good",
            QualityLabel::Excellent => "Excellent",
        };
        f.write_str(label)
    }
}

impl QualityMetrics {
    /// Build a snapshot from raw measurements, computing the composite score
    pub fn from_measurements(
        snr_db: f64,
        spectral_flatness: f64,
        dynamic_range_db: f64,
        clipping_ratio: f64,
        silence_ratio: f64,
    ) -> Self {
        let quality_score = quality_score(
            snr_db,
            spectral_flatness,
            dynamic_range_db,
            clipping_ratio,
            silence_ratio,
        );
        Self {
            snr_db,
            spectral_flatness,
            dynamic_range_db,
            clipping_ratio,
            silence_ratio,
            quality_score,
        }
    }

    /// Noise or overall quality is bad enough for neural denoising
    pub fn needs_ai_enhancement(&self) -> bool {
        self.quality_score < thresholds::NEEDS_AI_SCORE || self.snr_db < thresholds::NEEDS_AI_SNR_DB
    }

    pub fn is_high_quality(&self) -> bool {
        self.quality_score > thresholds::HIGH_QUALITY_SCORE
    }

    pub fn quality_label(&self) -> QualityLabel {
        match self.quality_score {
            s if s < 0.3 => QualityLabel::Poor,
            s if s < 0.6 => QualityLabel::Medium,
            s if s < 0.8 => QualityLabel::Good,
            _ => QualityLabel::Excellent,
        }
    }

    /// Relative score change versus `before` (0.5 means 50% better)
    ///
    /// Returns 0.0 when `before` scored zero.
    pub fn improvement_from(&self, before: &QualityMetrics) -> f64 {
        if before.quality_score == 0.0 {
            return 0.0;
        }
        (self.quality_score - before.quality_score) / before.quality_score
    }
}

/// Composite score from raw measurements, clamped to [0, 1]
pub fn quality_score(
    snr_db: f64,
    spectral_flatness: f64,
    dynamic_range_db: f64,
    clipping_ratio: f64,
    silence_ratio: f64,
) -> f64 {
    let snr_score = (snr_db / SNR_FULL_SCORE_DB).clamp(0.0, 1.0);
    let flatness_score = 1.0 - (spectral_flatness / FLATNESS_ZERO_SCORE).clamp(0.0, 1.0);
    let dynamic_range_score = (dynamic_range_db / DYNAMIC_RANGE_FULL_SCORE_DB).clamp(0.0, 1.0);
    let clipping_score = 1.0 - (clipping_ratio / CLIPPING_ZERO_SCORE).clamp(0.0, 1.0);
    let silence_score = if silence_ratio < MOSTLY_SILENT_RATIO {
        1.0
    } else {
        0.5
    };

    let score = weights::SNR * snr_score
        + weights::FLATNESS * flatness_score
        + weights::DYNAMIC_RANGE * dynamic_range_score
        + weights::CLIPPING * clipping_score
        + weights::SILENCE * silence_score;

    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
