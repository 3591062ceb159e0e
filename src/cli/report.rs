//! Console output for CLI commands

use std::path::Path;

use serde::Serialize;

use crate::analysis::{QualityLabel, QualityMetrics};
use crate::config::QualityLevel;
use crate::engine::AudioBuffer;
use crate::pipeline::{Decision, ProcessingResult, StageEvent, StageObserver};

/// Prints `Stage i/N: name` as the pipeline advances
#[derive(Debug, Default)]
pub struct ProgressReporter;

impl ProgressReporter {
    pub fn line(event: &StageEvent) -> Option<String> {
        match event {
            StageEvent::Started { name, index, total } => {
                Some(format!("Stage {}/{}: {}", index, total, name))
            }
            StageEvent::Finished { ran: false, .. } => Some("  skipped".to_string()),
            StageEvent::Finished { duration, .. } => {
                Some(format!("  done in {:.2}s", duration.as_secs_f64()))
            }
        }
    }
}

impl StageObserver for ProgressReporter {
    fn on_event(&self, event: &StageEvent) {
        if let Some(line) = Self::line(event) {
            println!("{}", line);
        }
    }
}

/// `analyze` output
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub path: String,
    pub sample_rate: u32,
    pub channels: usize,
    pub duration_secs: f64,
    pub metrics: QualityMetrics,
    pub label: QualityLabel,
    pub recommended_level: QualityLevel,
}

impl AnalysisReport {
    pub fn new(
        path: &Path,
        buffer: &AudioBuffer,
        metrics: QualityMetrics,
        recommended_level: QualityLevel,
    ) -> Self {
        Self {
            path: path.display().to_string(),
            sample_rate: buffer.sample_rate(),
            channels: buffer.channels(),
            duration_secs: buffer.duration_secs(),
            label: metrics.quality_label(),
            metrics,
            recommended_level,
        }
    }
}

pub fn print_analysis(report: &AnalysisReport) {
    println!("=== Analysis: {} ===", report.path);
    println!(
        "{} Hz, {} channel(s), {:.2}s",
        report.sample_rate, report.channels, report.duration_secs
    );
    print_metrics(&report.metrics);
    println!("Recommended level: {}", report.recommended_level);
}

pub fn print_metrics(metrics: &QualityMetrics) {
    println!("  SNR:               {:.1} dB", metrics.snr_db);
    println!("  Spectral flatness: {:.3}", metrics.spectral_flatness);
    println!("  Dynamic range:     {:.1} dB", metrics.dynamic_range_db);
    println!("  Clipping:          {:.3}%", metrics.clipping_ratio * 100.0);
    println!("  Silence:           {:.1}%", metrics.silence_ratio * 100.0);
    println!(
        "  Quality score:     {:.3} ({})",
        metrics.quality_score,
        metrics.quality_label()
    );
}

pub fn print_decision(decision: &Decision) {
    println!("Level: {}", decision.quality_level);
    if decision.overridden {
        println!("  (recommended: {})", decision.recommended_level);
    }
    for stage in &decision.stages {
        let state = if stage.enabled { "on" } else { "off" };
        println!("  {:<16} {}", stage.name.as_str(), state);
    }
    for line in &decision.reasoning {
        println!("  - {}", line);
    }
}

pub fn print_result(result: &ProcessingResult, output: Option<&Path>) {
    if !result.success {
        println!(
            "FAILED: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        );
        return;
    }

    if let Some(level) = result.quality_level {
        println!("Level: {}", level);
    }
    for stage in &result.stages {
        let mut line = format!("  {:<16} {}", stage.name.as_str(), stage.method);
        if let Some(reason) = &stage.fallback_reason {
            line.push_str(&format!(" (fallback: {})", reason));
        }
        println!("{}", line);
    }

    if let (Some(before), Some(after)) = (&result.input_metrics, &result.output_metrics) {
        println!(
            "Quality: {:.3} -> {:.3} ({:+.3}, {:+.1}%)",
            before.quality_score,
            after.quality_score,
            result.score_delta(),
            after.improvement_from(before) * 100.0
        );
    }
    if let Some(validation) = &result.validation {
        for reason in &validation.reasons {
            println!("Warning: {}", reason);
        }
    }
    if result.rolled_back {
        println!("Processing made things worse; the original audio was kept");
    }
    if let Some(path) = output {
        println!("Wrote {}", path.display());
    }
    println!("Completed in {:.2}s", result.total_duration_secs);
}

pub fn to_json<T: Serialize>(value: &T) -> crate::error::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
