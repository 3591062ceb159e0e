//! Mock denoise models for testing
//!
//! These do no real inference; they let the pipeline's AI path and its
//! fallback be exercised deterministically.

use super::model::DenoiseModel;
use crate::engine::{db_to_linear, AudioBuffer};
use crate::error::{EnhanceError, Result};

/// A model that always fails with `ModelFailed`
#[derive(Debug, Clone)]
pub struct FailingModel {
    reason: String,
}

impl FailingModel {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for FailingModel {
    fn default() -> Self {
        Self::new("simulated inference failure")
    }
}

impl DenoiseModel for FailingModel {
    fn name(&self) -> &str {
        "mock-failing"
    }

    fn denoise(&mut self, _input: &AudioBuffer, _strength: f32) -> Result<AudioBuffer> {
        Err(EnhanceError::ModelFailed {
            model: self.name().to_string(),
            reason: self.reason.clone(),
        })
    }
}

/// A model that attenuates the whole signal by `reduction_db * strength`
///
/// With `reduction_db == 0.0` it is an exact passthrough.
#[derive(Debug, Clone, Default)]
pub struct AttenuatingModel {
    reduction_db: f32,
    calls: usize,
}

impl AttenuatingModel {
    pub fn new(reduction_db: f32) -> Self {
        Self {
            reduction_db,
            calls: 0,
        }
    }

    pub fn passthrough() -> Self {
        Self::new(0.0)
    }

    /// Number of completed `denoise` calls
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl DenoiseModel for AttenuatingModel {
    fn name(&self) -> &str {
        "mock-attenuating"
    }

    fn denoise(&mut self, input: &AudioBuffer, strength: f32) -> Result<AudioBuffer> {
        self.calls += 1;
        if self.reduction_db == 0.0 {
            return Ok(input.clone());
        }
        input.scaled(db_to_linear(-self.reduction_db * strength))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generate_test_tone;

    #[test]
    fn test_failing_model_reports_model_error() {
        let input = generate_test_tone(440.0, 0.5, 0.1, 16000).unwrap();
        let err = FailingModel::default().denoise(&input, 0.5).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_attenuating_model() {
        let input = generate_test_tone(440.0, 0.5, 0.1, 16000).unwrap();
        let mut model = AttenuatingModel::new(6.0);
        let out = model.denoise(&input, 1.0).unwrap();
        assert!((out.peak() / input.peak() - db_to_linear(-6.0)).abs() < 1e-4);
        assert_eq!(model.calls(), 1);

        let mut passthrough = AttenuatingModel::passthrough();
        assert_eq!(passthrough.denoise(&input, 1.0).unwrap(), input);
    }
}
