//! Output Validator
//!
//! Compares metrics before and after processing and decides whether the
//! processed audio is kept.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::analysis::QualityMetrics;

/// Clipping increase tolerated before warning
pub const CLIPPING_TOLERANCE: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accept,
    Warn,
    /// Processing made things worse; keep the original
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub verdict: Verdict,
    pub reasons: Vec<String>,
}

impl Validation {
    pub fn is_rollback(&self) -> bool {
        self.verdict == Verdict::Rollback
    }
}

/// Validate without fallback information
pub fn validate(input: &QualityMetrics, output: &QualityMetrics) -> Validation {
    validate_with_fallback(input, output, false)
}

/// Validate a run; `fallback_occurred` means AI was requested but not used
pub fn validate_with_fallback(
    input: &QualityMetrics,
    output: &QualityMetrics,
    fallback_occurred: bool,
) -> Validation {
    if output.quality_score < input.quality_score {
        let reason = format!(
            "quality score dropped from {:.4} to {:.4}",
            input.quality_score, output.quality_score
        );
        warn!("rolling back: {}", reason);
        return Validation {
            verdict: Verdict::Rollback,
            reasons: vec![reason],
        };
    }

    let mut reasons = Vec::new();
    let clipping_increase = output.clipping_ratio - input.clipping_ratio;
    if clipping_increase > CLIPPING_TOLERANCE {
        reasons.push(format!(
            "clipping increased from {:.4} to {:.4}",
            input.clipping_ratio, output.clipping_ratio
        ));
    }
    if fallback_occurred {
        reasons.push("AI noise reduction was requested but spectral gating was used".to_string());
    }

    if reasons.is_empty() {
        Validation {
            verdict: Verdict::Accept,
            reasons,
        }
    } else {
        for reason in &reasons {
            warn!("validation warning: {}", reason);
        }
        Validation {
            verdict: Verdict::Warn,
            reasons,
        }
    }
}
