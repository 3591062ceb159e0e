//! Pipeline Scenario Tests
//!
//! Whole-pipeline behavior on synthetic recordings: level selection, AI
//! fallback, silence, clipping warnings, rollback and determinism.

use std::sync::Arc;

use enhance_audio::analysis::analyze;
use enhance_audio::config::{EnhancementConfig, QualityLevel};
use enhance_audio::engine::{generate_test_tone, AudioBuffer};
use enhance_audio::neural::mock::{AttenuatingModel, FailingModel};
use enhance_audio::neural::{DenoiseModel, ModelProvider};
use enhance_audio::pipeline::decision::plan_stages;
use enhance_audio::pipeline::{
    select_config, validate, Pipeline, StageName, UserOverride, Verdict,
};
use enhance_audio::{QualityMetrics, Result};

/// Deterministic uniform noise in [-1, 1)
struct Noise(u64);

impl Noise {
    fn next(&mut self) -> f32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        ((self.0 >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
    }
}

/// 440 Hz tone at 0.3 with white noise roughly 10 dB below it
fn noisy_tone(sample_rate: u32, secs: f32) -> AudioBuffer {
    let tone = generate_test_tone(440.0, 0.3, secs, sample_rate).unwrap();
    let mut noise = Noise(0x2545_f491_4f6c_dd1d);
    let samples = tone
        .channel(0)
        .iter()
        .map(|&s| s + 0.116 * noise.next())
        .collect();
    AudioBuffer::from_channels(vec![samples], sample_rate).unwrap()
}

/// Removes all noise from a 440 Hz tone at 0.3 but drives every 400th
/// sample to full scale
struct ClippingDenoiser;

impl DenoiseModel for ClippingDenoiser {
    fn name(&self) -> &str {
        "clipping-denoiser"
    }

    fn denoise(&mut self, input: &AudioBuffer, _strength: f32) -> Result<AudioBuffer> {
        let rate = input.sample_rate() as f32;
        let channels = (0..input.channels())
            .map(|_| {
                (0..input.len())
                    .map(|i| {
                        if i % 400 == 0 {
                            1.0
                        } else {
                            0.3 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / rate).sin()
                        }
                    })
                    .collect()
            })
            .collect();
        input.with_samples(channels)
    }
}

fn no_ai() -> Arc<ModelProvider> {
    Arc::new(ModelProvider::unavailable("model not installed"))
}

/// Noise reduction only, so the gate alone decides the outcome
fn denoise_only(ai: bool) -> EnhancementConfig {
    EnhancementConfig::builder()
        .noise_reduction_strength(0.5)
        .eq_enabled(false)
        .dynamics_enabled(false)
        .ai_enhancement_enabled(ai)
        .build()
        .unwrap()
}

// === Level selection ===

#[test]
fn test_clean_tone_gets_light_touch() {
    let input = generate_test_tone(440.0, 0.5, 2.0, 44100).unwrap();
    let metrics = analyze(&input).unwrap();
    assert!(metrics.quality_score > 0.8, "score {}", metrics.quality_score);

    let decision = select_config(&metrics, &UserOverride::default()).unwrap();
    assert!(matches!(
        decision.quality_level,
        QualityLevel::Minimal | QualityLevel::Light
    ));
    assert!(!decision.config.ai_enhancement_enabled());
    assert!(decision.config.noise_reduction_strength() <= 0.2);

    let outcome = Pipeline::new(no_ai()).run(&input, &UserOverride::default());
    assert!(outcome.result.success);
    assert!(!outcome.result.ai_used());
}

#[test]
fn test_user_level_on_clean_tone_skips_the_model() {
    let provider = Arc::new(ModelProvider::with_model(Box::new(
        AttenuatingModel::passthrough(),
    )));
    let input = generate_test_tone(440.0, 0.5, 1.0, 16000).unwrap();
    let overrides = UserOverride::default().with_level(QualityLevel::Aggressive);
    let result = Pipeline::new(provider).run(&input, &overrides).result;

    assert!(result.success);
    assert_eq!(result.quality_level, Some(QualityLevel::Aggressive));
    assert!(!result.ai_used());
    assert!(!result.fallback_used());
}

// === AI fallback ===

#[test]
fn test_noisy_input_falls_back_to_spectral_gating() {
    let input = noisy_tone(44100, 2.0);
    let metrics = analyze(&input).unwrap();
    assert!(metrics.snr_db < 20.0, "snr {}", metrics.snr_db);
    assert!(metrics.needs_ai_enhancement());

    let config = denoise_only(true);
    let outcome = Pipeline::new(no_ai()).enhance(&input, &config, &plan_stages(&config));
    let result = outcome.result;

    assert!(result.success);
    assert_eq!(result.noise_method(), Some("spectral_gating"));
    let nr = result.stage(StageName::NoiseReduction).unwrap();
    assert!(nr.fallback_reason.as_deref().unwrap().contains("model not installed"));
    assert!(!result.rolled_back);

    let validation = result.validation.unwrap();
    assert_eq!(validation.verdict, Verdict::Warn);
    assert!(validation.reasons.iter().any(|r| r.contains("spectral gating")));
}

#[test]
fn test_failing_model_falls_back() {
    let provider = Arc::new(ModelProvider::with_model(Box::new(FailingModel::new(
        "out of memory",
    ))));
    let input = noisy_tone(16000, 1.0);
    let config = denoise_only(true);
    let result = Pipeline::new(provider)
        .enhance(&input, &config, &plan_stages(&config))
        .result;

    assert!(result.success);
    assert!(result.fallback_used());
    assert_eq!(result.noise_method(), Some("spectral_gating"));
}

#[test]
fn test_disabled_ai_never_calls_the_model() {
    // A model that would wipe the signal; using it would force a rollback
    let provider = Arc::new(ModelProvider::with_model(Box::new(AttenuatingModel::new(
        100.0,
    ))));
    let input = noisy_tone(16000, 1.0);
    let config = denoise_only(false);
    let result = Pipeline::new(provider)
        .enhance(&input, &config, &plan_stages(&config))
        .result;

    assert!(result.success);
    assert_eq!(result.noise_method(), Some("spectral_gating"));
    assert!(!result.ai_used());
    assert!(!result.fallback_used());
    assert_eq!(result.validation.unwrap().verdict, Verdict::Accept);
}

#[test]
fn test_no_ai_override_through_run() {
    let provider = Arc::new(ModelProvider::with_model(Box::new(
        AttenuatingModel::passthrough(),
    )));
    let input = noisy_tone(16000, 1.0);
    let overrides = UserOverride::default()
        .with_level(QualityLevel::Aggressive)
        .without_ai();
    let result = Pipeline::new(provider).run(&input, &overrides).result;

    assert!(result.success);
    assert_eq!(result.quality_level, Some(QualityLevel::Aggressive));
    assert_eq!(result.noise_method(), Some("spectral_gating"));
}

// === Silence ===

#[test]
fn test_silent_buffer_is_handled() {
    let input = AudioBuffer::from_channels(vec![vec![0.0; 16000]], 16000).unwrap();
    let metrics = analyze(&input).unwrap();
    assert_eq!(metrics.silence_ratio, 1.0);
    assert_eq!(metrics.dynamic_range_db, 0.0);
    assert_eq!(metrics.snr_db, 0.0);
    assert!(metrics.quality_score.is_finite());

    let outcome = Pipeline::new(no_ai()).run(&input, &UserOverride::default());
    assert!(outcome.result.success);
    let audio = outcome.audio.unwrap();
    assert_eq!(audio.len(), input.len());
    assert!(audio.is_finite());
}

// === Clipping ===

#[test]
fn test_clipping_increase_warns() {
    let before = QualityMetrics::from_measurements(10.0, 0.1, 10.0, 0.19, 0.0);
    let after = QualityMetrics::from_measurements(30.0, 0.1, 10.0, 0.2, 0.0);
    let validation = validate(&before, &after);
    assert_eq!(validation.verdict, Verdict::Warn);
}

#[test]
fn test_denoiser_that_clips_is_kept_with_warning() {
    let provider = Arc::new(ModelProvider::with_model(Box::new(ClippingDenoiser)));
    let input = noisy_tone(16000, 1.0);
    let config = denoise_only(true);
    let result = Pipeline::new(provider)
        .enhance(&input, &config, &plan_stages(&config))
        .result;

    assert!(result.success);
    assert!(result.ai_used());
    assert!(!result.rolled_back);
    let input_metrics = result.input_metrics.unwrap();
    let output_metrics = result.output_metrics.unwrap();
    assert!(output_metrics.quality_score >= input_metrics.quality_score);
    assert!(output_metrics.clipping_ratio > input_metrics.clipping_ratio + 0.001);

    let validation = result.validation.unwrap();
    assert_eq!(validation.verdict, Verdict::Warn);
    assert_eq!(validation.reasons.len(), 1);
    assert!(validation.reasons[0].contains("clipping increased"));
}

#[test]
fn test_dynamics_never_clips() {
    let input = noisy_tone(16000, 1.0).scaled(0.1).unwrap();
    let overrides = UserOverride::default().with_level(QualityLevel::Aggressive);
    let outcome = Pipeline::new(no_ai()).run(&input, &overrides);

    assert!(outcome.result.success);
    assert!(outcome.audio.unwrap().peak() <= 0.9);
    assert_eq!(outcome.result.output_metrics.unwrap().clipping_ratio, 0.0);
}

// === Rollback and repeatability ===

#[test]
fn test_rollback_returns_original_samples() {
    let provider = Arc::new(ModelProvider::with_model(Box::new(AttenuatingModel::new(
        100.0,
    ))));
    let input = generate_test_tone(220.0, 0.4, 1.0, 16000).unwrap();
    let config = EnhancementConfig::builder()
        .noise_reduction_strength(1.0)
        .eq_enabled(false)
        .dynamics_enabled(false)
        .ai_enhancement_enabled(true)
        .build()
        .unwrap();
    let outcome = Pipeline::new(provider).enhance(&input, &config, &plan_stages(&config));

    assert!(outcome.result.rolled_back);
    assert_eq!(
        outcome.result.validation.as_ref().unwrap().verdict,
        Verdict::Rollback
    );
    assert_eq!(outcome.audio.unwrap(), input);
    assert_eq!(
        outcome.result.output_fingerprint.as_deref(),
        Some(input.fingerprint().as_str())
    );
}

#[test]
fn test_runs_are_deterministic() {
    let input = noisy_tone(16000, 1.0);
    let pipeline = Pipeline::new(no_ai());
    let first = pipeline.run(&input, &UserOverride::default());
    let second = pipeline.run(&input, &UserOverride::default());

    assert_eq!(first.audio, second.audio);
    assert_eq!(first.result.output_metrics, second.result.output_metrics);
    assert_eq!(first.result.stages.len(), second.result.stages.len());
}

#[test]
fn test_reprocessing_never_lowers_the_score() {
    let input = noisy_tone(16000, 1.0);
    let pipeline = Pipeline::new(no_ai());

    let first = pipeline.run(&input, &UserOverride::default());
    let once = first.audio.unwrap();
    let once_score = first.result.output_metrics.unwrap().quality_score;

    let second = pipeline.run(&once, &UserOverride::default());
    let twice_score = second.result.output_metrics.unwrap().quality_score;

    assert!(twice_score >= once_score);
    assert!(once_score >= first.result.input_metrics.unwrap().quality_score);
}

#[test]
fn test_stereo_input_keeps_layout() {
    let left = generate_test_tone(440.0, 0.4, 1.0, 16000).unwrap();
    let right = generate_test_tone(660.0, 0.2, 1.0, 16000).unwrap();
    let input = AudioBuffer::from_channels(
        vec![left.channel(0).to_vec(), right.channel(0).to_vec()],
        16000,
    )
    .unwrap();

    let outcome = Pipeline::new(no_ai()).run(
        &input,
        &UserOverride::default().with_level(QualityLevel::Standard),
    );
    assert!(outcome.result.success);
    let audio = outcome.audio.unwrap();
    assert_eq!(audio.channels(), 2);
    assert_eq!(audio.len(), input.len());
}
