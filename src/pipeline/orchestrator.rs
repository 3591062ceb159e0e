//! Pipeline Orchestrator
//!
//! Runs the planned stages strictly in order, records one [`StageResult`]
//! per stage, validates the result and rolls back to the original audio when
//! processing made it measurably worse.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use super::decision::{select_config, UserOverride};
use super::dynamics::apply_dynamics;
use super::events::{StageEvent, StageObserver};
use super::noise_reduction::reduce_noise;
use super::result::{EnhancementOutcome, ProcessingResult};
use super::spectral::apply_spectral;
use super::stage::{PlannedStage, StageName, StageParameters, StageResult};
use super::validator::{validate_with_fallback, Verdict};
use crate::analysis::{analyze, QualityMetrics};
use crate::config::{EnhancementConfig, QualityLevel};
use crate::engine::AudioBuffer;
use crate::error::{EnhanceError, Result};
use crate::neural::ModelProvider;

/// The enhancement pipeline
///
/// Holds the shared model provider, optional observers and a cancellation
/// flag. One `Pipeline` can run many buffers; runs share no mutable state
/// apart from the provider's serialized model access.
pub struct Pipeline {
    provider: Arc<ModelProvider>,
    observers: Vec<Box<dyn StageObserver>>,
    cancel: Arc<AtomicBool>,
}

/// What one stage produced
struct StageOutput {
    buffer: AudioBuffer,
    ran: bool,
    method: String,
    parameters: StageParameters,
    fallback_reason: Option<String>,
}

impl Pipeline {
    pub fn new(provider: Arc<ModelProvider>) -> Self {
        Self {
            provider,
            observers: Vec::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn StageObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Handle that cancels runs at the next stage boundary when set
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn provider(&self) -> &ModelProvider {
        &self.provider
    }

    fn emit(&self, event: StageEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }

    /// Analyze, decide and enhance
    pub fn run(&self, input: &AudioBuffer, overrides: &UserOverride) -> EnhancementOutcome {
        let started = Instant::now();
        let mut result = ProcessingResult::new(input.fingerprint());

        let metrics = match analyze(input) {
            Ok(m) => m,
            Err(e) => return fail(result, "analysis", &e, started),
        };
        let decision = match select_config(&metrics, overrides) {
            Ok(d) => d,
            Err(e) => {
                result.input_metrics = Some(metrics);
                return fail(result, "decision", &e, started);
            }
        };
        for line in &decision.reasoning {
            debug!("{}", line);
        }

        self.execute(
            input,
            &decision.config,
            &decision.stages,
            Some(decision.quality_level),
            metrics,
            result,
            started,
        )
    }

    /// Run `stages` with `config` on `input`
    pub fn enhance(
        &self,
        input: &AudioBuffer,
        config: &EnhancementConfig,
        stages: &[PlannedStage],
    ) -> EnhancementOutcome {
        let started = Instant::now();
        let result = ProcessingResult::new(input.fingerprint());
        match analyze(input) {
            Ok(metrics) => self.execute(input, config, stages, None, metrics, result, started),
            Err(e) => fail(result, "analysis", &e, started),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn execute(
        &self,
        input: &AudioBuffer,
        config: &EnhancementConfig,
        stages: &[PlannedStage],
        quality_level: Option<QualityLevel>,
        input_metrics: QualityMetrics,
        mut result: ProcessingResult,
        started: Instant,
    ) -> EnhancementOutcome {
        result.quality_level = quality_level;
        result.config = Some(*config);
        result.input_metrics = Some(input_metrics);

        let total = stages.len();
        let mut current = input.clone();
        let mut fallback_occurred = false;

        for (i, planned) in stages.iter().enumerate() {
            let index = i + 1;
            let name = planned.name;

            if self.cancel.load(Ordering::SeqCst) {
                let err = EnhanceError::Cancelled {
                    stage: name.to_string(),
                };
                return fail(result, name.as_str(), &err, started);
            }

            self.emit(StageEvent::Started { name, index, total });
            let stage_start = Instant::now();

            let stage_result = if planned.enabled {
                match self.run_stage(name, &current, config) {
                    Ok(output) => {
                        let mut record = StageResult::new(name, output.method)
                            .with_parameters(output.parameters);
                        record.ran = output.ran;
                        record.fallback_reason = output.fallback_reason;
                        record.output_fingerprint = Some(output.buffer.fingerprint());
                        fallback_occurred |= record.used_fallback();
                        current = output.buffer;
                        record
                    }
                    Err(e) => {
                        let mut record = StageResult::failed(name, &e.to_string());
                        record.duration_secs = stage_start.elapsed().as_secs_f64();
                        result.stages.push(record);
                        self.emit(StageEvent::Finished {
                            name,
                            index,
                            total,
                            duration: stage_start.elapsed(),
                            ran: false,
                        });
                        return fail(result, name.as_str(), &e, started);
                    }
                }
            } else {
                StageResult::disabled(name, current.fingerprint())
            };

            let duration = stage_start.elapsed();
            let ran = stage_result.ran;
            result.stages.push(StageResult {
                duration_secs: duration.as_secs_f64(),
                ..stage_result
            });
            self.emit(StageEvent::Finished {
                name,
                index,
                total,
                duration,
                ran,
            });
        }

        let processed_metrics = match analyze(&current) {
            Ok(m) => m,
            Err(e) => return fail(result, "validation", &e, started),
        };

        let validation = validate_with_fallback(
            &input_metrics,
            &processed_metrics,
            fallback_occurred && config.ai_enhancement_enabled(),
        );

        let audio = if validation.verdict == Verdict::Rollback {
            result.rolled_back = true;
            result.rejected_metrics = Some(processed_metrics);
            result.output_metrics = Some(input_metrics);
            result.output_fingerprint = Some(result.input_fingerprint.clone());
            input.clone()
        } else {
            result.improved = processed_metrics.quality_score > input_metrics.quality_score;
            result.output_metrics = Some(processed_metrics);
            result.output_fingerprint = Some(current.fingerprint());
            current
        };

        result.validation = Some(validation);
        result.success = true;
        result.total_duration_secs = started.elapsed().as_secs_f64();

        info!(
            "run {} finished: score {:.3} -> {:.3}, verdict {:?}, {:.2}s",
            result.run_id,
            input_metrics.quality_score,
            processed_metrics.quality_score,
            result.validation.as_ref().map(|v| v.verdict),
            result.total_duration_secs
        );

        EnhancementOutcome {
            result,
            audio: Some(audio),
        }
    }

    fn run_stage(
        &self,
        name: StageName,
        input: &AudioBuffer,
        config: &EnhancementConfig,
    ) -> Result<StageOutput> {
        match name {
            StageName::NoiseReduction => {
                let outcome = reduce_noise(input, config, &self.provider);
                let mut parameters = outcome.parameters;
                parameters.insert(
                    "transitions".to_string(),
                    serde_json::to_value(&outcome.transitions)?,
                );
                Ok(StageOutput {
                    ran: true,
                    method: outcome.method.as_str().to_string(),
                    buffer: outcome.buffer,
                    parameters,
                    fallback_reason: outcome.fallback_reason,
                })
            }
            StageName::Spectral => {
                let outcome = apply_spectral(input, config)?;
                Ok(StageOutput {
                    method: if outcome.ran { "eq" } else { "none" }.to_string(),
                    ran: outcome.ran,
                    buffer: outcome.buffer,
                    parameters: outcome.parameters,
                    fallback_reason: None,
                })
            }
            StageName::Dynamics => {
                let outcome = apply_dynamics(input, config)?;
                Ok(StageOutput {
                    method: if outcome.ran { "compress_normalize_limit" } else { "none" }
                        .to_string(),
                    ran: outcome.ran,
                    buffer: outcome.buffer,
                    parameters: outcome.parameters,
                    fallback_reason: None,
                })
            }
        }
    }
}

/// Close a run as failed
fn fail(
    mut result: ProcessingResult,
    stage: &str,
    err: &EnhanceError,
    started: Instant,
) -> EnhancementOutcome {
    error!("run {} failed in stage '{}': {}", result.run_id, stage, err);
    result.success = false;
    result.error_message = Some(format!("stage '{}' failed: {}", stage, err));
    result.total_duration_secs = started.elapsed().as_secs_f64();
    EnhancementOutcome {
        result,
        audio: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generate_test_tone;
    use crate::neural::mock::AttenuatingModel;
    use crate::pipeline::decision::plan_stages;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Arc<Mutex<Vec<StageEvent>>>);

    impl StageObserver for Recorder {
        fn on_event(&self, event: &StageEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    fn no_ai() -> Arc<ModelProvider> {
        Arc::new(ModelProvider::unavailable("test"))
    }

    #[test]
    fn test_events_cover_every_stage() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(no_ai()).with_observer(Box::new(Recorder(Arc::clone(&events))));
        let input = generate_test_tone(440.0, 0.5, 1.0, 16000).unwrap();
        let config = EnhancementConfig::preset(QualityLevel::Minimal);
        let outcome = pipeline.enhance(&input, &config, &plan_stages(&config));

        assert!(outcome.result.success);
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 6);
        assert_eq!(
            events[0],
            StageEvent::Started {
                name: StageName::NoiseReduction,
                index: 1,
                total: 3
            }
        );
        assert!(matches!(
            events[5],
            StageEvent::Finished { name: StageName::Dynamics, ran: false, .. }
        ));
    }

    #[test]
    fn test_disabled_stages_recorded() {
        let pipeline = Pipeline::new(no_ai());
        let input = generate_test_tone(440.0, 0.5, 1.0, 16000).unwrap();
        let config = EnhancementConfig::preset(QualityLevel::Minimal);
        let outcome = pipeline.enhance(&input, &config, &plan_stages(&config));
        let result = outcome.result;
        assert_eq!(result.stages.len(), 3);
        assert!(result.stage(StageName::NoiseReduction).unwrap().ran);
        assert!(!result.stage(StageName::Spectral).unwrap().enabled);
        assert!(!result.stage(StageName::Dynamics).unwrap().ran);
    }

    #[test]
    fn test_cancel_before_first_stage() {
        let pipeline = Pipeline::new(no_ai());
        pipeline.cancel_handle().store(true, Ordering::SeqCst);
        let input = generate_test_tone(440.0, 0.5, 0.5, 16000).unwrap();
        let outcome = pipeline.run(&input, &UserOverride::default());
        assert!(!outcome.result.success);
        assert!(outcome.audio.is_none());
        assert!(outcome.result.stages.is_empty());
        assert!(outcome
            .result
            .error_message
            .unwrap()
            .contains("noise_reduction"));
    }

    #[test]
    fn test_empty_input_fails_in_analysis() {
        let pipeline = Pipeline::new(no_ai());
        let input = AudioBuffer::from_channels(vec![vec![]], 16000).unwrap();
        let outcome = pipeline.run(&input, &UserOverride::default());
        assert!(!outcome.result.success);
        assert!(outcome.result.error_message.unwrap().contains("analysis"));
    }

    #[test]
    fn test_destructive_model_is_rolled_back() {
        let provider = Arc::new(ModelProvider::with_model(Box::new(AttenuatingModel::new(100.0))));
        let pipeline = Pipeline::new(provider);
        let input = generate_test_tone(440.0, 0.5, 1.0, 16000).unwrap();
        let config = EnhancementConfig::builder()
            .noise_reduction_strength(1.0)
            .eq_enabled(false)
            .dynamics_enabled(false)
            .ai_enhancement_enabled(true)
            .build()
            .unwrap();
        let outcome = pipeline.enhance(&input, &config, &plan_stages(&config));

        assert!(outcome.result.success);
        assert!(outcome.result.rolled_back);
        assert!(!outcome.result.improved);
        assert!(outcome.result.ai_used());
        assert_eq!(outcome.audio.unwrap(), input);
        assert_eq!(outcome.result.output_metrics, outcome.result.input_metrics);
        assert!(outcome.result.rejected_metrics.is_some());
    }
}
