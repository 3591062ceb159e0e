//! Run records

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::noise_reduction::NoiseMethod;
use super::stage::{StageName, StageResult};
use super::validator::Validation;
use crate::analysis::QualityMetrics;
use crate::config::{EnhancementConfig, QualityLevel};
use crate::engine::AudioBuffer;

/// Everything known about one pipeline run; contains no sample data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub success: bool,
    pub quality_level: Option<QualityLevel>,
    pub config: Option<EnhancementConfig>,
    pub input_metrics: Option<QualityMetrics>,
    /// Metrics of the audio actually returned (the input's after a rollback)
    pub output_metrics: Option<QualityMetrics>,
    /// Metrics of processed audio the validator rejected
    pub rejected_metrics: Option<QualityMetrics>,
    pub stages: Vec<StageResult>,
    pub total_duration_secs: f64,
    pub error_message: Option<String>,
    pub validation: Option<Validation>,
    pub rolled_back: bool,
    pub improved: bool,
    pub input_fingerprint: String,
    pub output_fingerprint: Option<String>,
}

impl ProcessingResult {
    pub fn new(input_fingerprint: String) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            success: false,
            quality_level: None,
            config: None,
            input_metrics: None,
            output_metrics: None,
            rejected_metrics: None,
            stages: Vec::new(),
            total_duration_secs: 0.0,
            error_message: None,
            validation: None,
            rolled_back: false,
            improved: false,
            input_fingerprint,
            output_fingerprint: None,
        }
    }

    pub fn stage(&self, name: StageName) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Method recorded by the noise-reduction stage, if it ran
    pub fn noise_method(&self) -> Option<&str> {
        self.stage(StageName::NoiseReduction)
            .filter(|s| s.ran)
            .map(|s| s.method.as_str())
    }

    pub fn ai_used(&self) -> bool {
        self.noise_method() == Some(NoiseMethod::Ai.as_str())
    }

    pub fn fallback_used(&self) -> bool {
        self.stages.iter().any(StageResult::used_fallback)
    }

    /// Score change versus the input, 0.0 when either side is missing
    pub fn score_delta(&self) -> f64 {
        match (&self.input_metrics, &self.output_metrics) {
            (Some(i), Some(o)) => o.quality_score - i.quality_score,
            _ => 0.0,
        }
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Result record plus the audio to export
#[derive(Debug, Clone)]
pub struct EnhancementOutcome {
    pub result: ProcessingResult,
    /// Final audio; `None` when the run failed
    pub audio: Option<AudioBuffer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_lookup_and_flags() {
        let mut result = ProcessingResult::new("abc".to_string());
        let mut nr = StageResult::new(StageName::NoiseReduction, "spectral_gating");
        nr.fallback_reason = Some("model missing".to_string());
        result.stages.push(nr);
        result
            .stages
            .push(StageResult::disabled(StageName::Spectral, "abc".to_string()));

        assert_eq!(result.noise_method(), Some("spectral_gating"));
        assert!(!result.ai_used());
        assert!(result.fallback_used());
        assert!(!result.stage(StageName::Spectral).unwrap().ran);
        assert!(result.stage(StageName::Dynamics).is_none());
    }

    #[test]
    fn test_score_delta() {
        let mut result = ProcessingResult::new("abc".to_string());
        assert_eq!(result.score_delta(), 0.0);

        result.input_metrics = Some(QualityMetrics::from_measurements(10.0, 0.3, 4.0, 0.0, 0.0));
        result.output_metrics = Some(QualityMetrics::from_measurements(30.0, 0.1, 6.0, 0.0, 0.0));
        let delta = result.score_delta();
        assert!(delta > 0.0);
        assert!((result.input_metrics.unwrap().quality_score + delta
            - result.output_metrics.unwrap().quality_score)
            .abs()
            < 1e-12);
    }

    #[test]
    fn test_serializes_flat() {
        let result = ProcessingResult::new("abc".to_string());
        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["input_fingerprint"], "abc");
        assert!(json["run_id"].is_string());
    }
}
