//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::{info, warn};
use walkdir::WalkDir;

use super::report::{
    print_analysis, print_decision, print_metrics, print_result, to_json, AnalysisReport,
    ProgressReporter,
};
use super::ProcessingArgs;
use crate::analysis::analyze;
use crate::config::Settings;
use crate::engine::io::OUTPUT_SUFFIX;
use crate::engine::{default_output_path, export_wav, load_wav, ExportOptions};
use crate::error::{EnhanceError, Result};
use crate::neural::ModelProvider;
use crate::pipeline::decision::recommend_level;
use crate::pipeline::{select_config, Pipeline, ProcessingResult, UserOverride};

/// One enhanced file
#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub result: ProcessingResult,
    /// Export failure after a successful run
    pub export_error: Option<EnhanceError>,
}

impl FileOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.success && self.export_error.is_none()
    }

    /// Turn a failed run or export into an error for the exit code
    pub fn into_result(self) -> Result<()> {
        if let Some(err) = self.export_error {
            return Err(err);
        }
        if !self.result.success {
            let reason = self
                .result
                .error_message
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(EnhanceError::processing("pipeline", reason));
        }
        Ok(())
    }
}

/// Load `input`, run the pipeline and write the result to `output`
///
/// Load errors and output conflicts are returned as errors. Pipeline failures
/// are reported in the result; an export failure marks the result failed and
/// is kept in `export_error`.
pub fn enhance_file(
    pipeline: &Pipeline,
    input: &Path,
    output: &Path,
    overrides: &UserOverride,
    force: bool,
) -> Result<FileOutcome> {
    if is_same_file(input, output) {
        return Err(EnhanceError::OutputWrite {
            path: output.display().to_string(),
            reason: "refusing to overwrite the input file".to_string(),
        });
    }
    if output.exists() && !force {
        return Err(EnhanceError::OutputWrite {
            path: output.display().to_string(),
            reason: "file already exists (use --force to replace it)".to_string(),
        });
    }

    let buffer = load_wav(input)?;
    let outcome = pipeline.run(&buffer, overrides);
    let mut result = outcome.result;
    let mut export_error = None;

    if let Some(audio) = outcome.audio {
        let options = ExportOptions {
            bit_depth: None,
            overwrite: force,
        };
        if let Err(err) = export_wav(&audio, output, &options) {
            warn!("Export failed for {}: {}", output.display(), err);
            result.success = false;
            result.error_message = Some(format!("export failed: {}", err));
            export_error = Some(err);
        }
    }

    Ok(FileOutcome {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        result,
        export_error,
    })
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// `enhance` command
pub fn enhance(
    input: &Path,
    output: Option<&Path>,
    args: &ProcessingArgs,
    dry_run: bool,
    settings: &Settings,
) -> Result<()> {
    info!("Enhancing: {}", input.display());
    let overrides = args.overrides(settings.ai_enabled);

    if dry_run {
        return show_plan(input, &overrides, args.json);
    }

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(input));

    let provider = Arc::new(ModelProvider::from_settings(settings));
    if let Some(reason) = provider.unavailable_reason() {
        info!("AI denoiser unavailable: {}", reason);
    }

    let mut pipeline = Pipeline::new(provider);
    if !args.json {
        pipeline = pipeline.with_observer(Box::new(ProgressReporter));
    }

    let outcome = enhance_file(&pipeline, input, &output, &overrides, args.force)?;

    if args.json {
        println!("{}", outcome.result.to_json()?);
    } else {
        let written = outcome.succeeded().then_some(outcome.output.as_path());
        print_result(&outcome.result, written);
    }

    outcome.into_result()
}

/// Print the decision for `input` without processing
fn show_plan(input: &Path, overrides: &UserOverride, json: bool) -> Result<()> {
    let buffer = load_wav(input)?;
    let metrics = analyze(&buffer)?;
    let decision = select_config(&metrics, overrides)?;

    if json {
        let plan = serde_json::json!({
            "input": input.display().to_string(),
            "metrics": metrics,
            "decision": decision,
        });
        println!("{}", to_json(&plan)?);
    } else {
        println!("=== Plan: {} ===", input.display());
        print_metrics(&metrics);
        print_decision(&decision);
        println!();
        println!("[Dry run - no changes made]");
    }
    Ok(())
}

/// `analyze` command
pub fn analyze_file(input: &Path, json: bool) -> Result<()> {
    info!("Analyzing: {}", input.display());

    let buffer = load_wav(input)?;
    let metrics = analyze(&buffer)?;
    let report = AnalysisReport::new(input, &buffer, metrics, recommend_level(&metrics));

    if json {
        println!("{}", to_json(&report)?);
    } else {
        print_analysis(&report);
    }
    Ok(())
}

// ============================================================================
// Batch
// ============================================================================

/// All `.wav` files under `dir`, sorted, skipping earlier outputs
pub fn find_wav_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            let is_wav = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("wav"))
                .unwrap_or(false);
            let is_output = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(|stem| stem.ends_with(OUTPUT_SUFFIX))
                .unwrap_or(false);
            is_wav && !is_output
        })
        .collect()
}

/// Where batch mode writes the enhanced version of `input`
///
/// With an output directory the layout below `root` is mirrored.
pub fn batch_output_path(root: &Path, input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let default = default_output_path(input);
    match output_dir {
        None => default,
        Some(out) => {
            let relative = input.strip_prefix(root).unwrap_or(input);
            let name = default.file_name().unwrap_or(input.as_os_str());
            match relative.parent() {
                Some(parent) => out.join(parent).join(name),
                None => out.join(name),
            }
        }
    }
}

/// Enhance `files` on `workers` scoped threads sharing one model provider
///
/// Outcomes are returned in input order.
pub fn run_batch(
    root: &Path,
    files: &[PathBuf],
    output_dir: Option<&Path>,
    workers: usize,
    provider: Arc<ModelProvider>,
    overrides: &UserOverride,
    force: bool,
) -> Vec<Result<FileOutcome>> {
    let next = AtomicUsize::new(0);
    let slots: Mutex<Vec<Option<Result<FileOutcome>>>> =
        Mutex::new((0..files.len()).map(|_| None).collect());

    std::thread::scope(|scope| {
        for _ in 0..workers.max(1) {
            let pipeline = Pipeline::new(Arc::clone(&provider));
            let next = &next;
            let slots = &slots;
            scope.spawn(move || loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(input) = files.get(index) else {
                    break;
                };
                let output = batch_output_path(root, input, output_dir);
                let outcome = prepare_output_dir(&output)
                    .and_then(|_| enhance_file(&pipeline, input, &output, overrides, force));
                slots.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(outcome);
            });
        }
    });

    slots
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| Err(EnhanceError::processing("batch", "worker exited early")))
        })
        .collect()
}

fn prepare_output_dir(output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// `batch` command
pub fn batch(
    dir: &Path,
    output_dir: Option<&Path>,
    jobs: Option<usize>,
    args: &ProcessingArgs,
    settings: &Settings,
) -> Result<()> {
    if !dir.is_dir() {
        return Err(EnhanceError::FileNotFound {
            path: dir.display().to_string(),
        });
    }

    let files = find_wav_files(dir);
    if files.is_empty() {
        println!("No .wav files found in {}", dir.display());
        return Ok(());
    }

    let workers = jobs.unwrap_or(settings.workers).clamp(1, files.len());
    info!(
        "Batch: {} file(s) from {} on {} worker(s)",
        files.len(),
        dir.display(),
        workers
    );

    let provider = Arc::new(ModelProvider::from_settings(settings));
    let overrides = args.overrides(settings.ai_enabled);
    let outcomes = run_batch(
        dir,
        &files,
        output_dir,
        workers,
        provider,
        &overrides,
        args.force,
    );

    let mut failed = 0;
    let mut records = Vec::new();
    for (input, outcome) in files.iter().zip(&outcomes) {
        match outcome {
            Ok(file) if file.succeeded() => {
                if !args.json {
                    println!(
                        "[ok]     {} -> {} ({}, {})",
                        input.display(),
                        file.output.display(),
                        file.result
                            .quality_level
                            .map(|l| l.as_str())
                            .unwrap_or("-"),
                        file.result.noise_method().unwrap_or("-")
                    );
                }
                records.push(serde_json::json!({
                    "input": input.display().to_string(),
                    "output": file.output.display().to_string(),
                    "result": file.result,
                }));
            }
            Ok(file) => {
                failed += 1;
                let reason = file.result.error_message.as_deref().unwrap_or("unknown error");
                if !args.json {
                    println!("[failed] {}: {}", input.display(), reason);
                }
                records.push(serde_json::json!({
                    "input": input.display().to_string(),
                    "result": file.result,
                }));
            }
            Err(err) => {
                failed += 1;
                warn!("{}: {}", input.display(), err);
                if !args.json {
                    println!("[failed] {}: {}", input.display(), err);
                }
                records.push(serde_json::json!({
                    "input": input.display().to_string(),
                    "error": err.to_string(),
                    "error_code": err.error_code(),
                }));
            }
        }
    }

    if args.json {
        println!("{}", to_json(&records)?);
    } else {
        println!(
            "Processed {} file(s): {} succeeded, {} failed",
            files.len(),
            files.len() - failed,
            failed
        );
    }

    if failed > 0 {
        return Err(EnhanceError::processing(
            "batch",
            format!("{} of {} files failed", failed, files.len()),
        ));
    }
    Ok(())
}
