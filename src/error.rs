//! Error handling for enhance-audio
//!
//! Every error carries a stable code, a process exit code and recovery
//! suggestions for the CLI.

use thiserror::Error;

/// Result type alias for enhance-audio operations
pub type Result<T> = std::result::Result<T, EnhanceError>;

/// Main error type for enhance-audio operations
#[derive(Error, Debug)]
pub enum EnhanceError {
    // Analysis Errors
    #[error("Analysis failed: {reason}")]
    Analysis { reason: String },

    // Model Errors
    #[error("AI model unavailable: {reason}")]
    ModelUnavailable { reason: String },

    #[error("AI model '{model}' failed: {reason}")]
    ModelFailed { model: String, reason: String },

    // Processing Errors
    #[error("Processing failed in stage '{stage}': {reason}")]
    ProcessingFailed { stage: String, reason: String },

    #[error("Invalid parameter '{param}': got {value}, expected {expected}")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    #[error("Run cancelled before stage '{stage}'")]
    Cancelled { stage: String },

    // File Errors
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid audio format: {reason}")]
    InvalidFormat { reason: String },

    #[error("Unsupported channel count: {channels} (only mono and stereo are supported)")]
    UnsupportedChannels { channels: usize },

    #[error("Corrupted audio file {path}: {reason}")]
    FileCorrupted { path: String, reason: String },

    // Export Errors
    #[error("Insufficient disk space to write {path}")]
    InsufficientSpace { path: String },

    #[error("Could not write output {path}: {reason}")]
    OutputWrite { path: String, reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EnhanceError {
    /// Shorthand for a stage failure
    pub fn processing(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        EnhanceError::ProcessingFailed {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            EnhanceError::Analysis { .. } => "ANALYSIS_ERROR",
            EnhanceError::ModelUnavailable { .. } => "MODEL_UNAVAILABLE",
            EnhanceError::ModelFailed { .. } => "MODEL_FAILED",
            EnhanceError::ProcessingFailed { .. } => "PROCESSING_FAILED",
            EnhanceError::InvalidParameter { .. } => "INVALID_PARAMETER",
            EnhanceError::Cancelled { .. } => "CANCELLED",
            EnhanceError::FileNotFound { .. } => "FILE_NOT_FOUND",
            EnhanceError::InvalidFormat { .. } => "INVALID_FORMAT",
            EnhanceError::UnsupportedChannels { .. } => "UNSUPPORTED_CHANNELS",
            EnhanceError::FileCorrupted { .. } => "FILE_CORRUPTED",
            EnhanceError::InsufficientSpace { .. } => "INSUFFICIENT_SPACE",
            EnhanceError::OutputWrite { .. } => "OUTPUT_WRITE_ERROR",
            EnhanceError::Io(_) => "IO_ERROR",
            EnhanceError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error can be absorbed inside the stage that raised it
    ///
    /// Recoverable errors never fail a run; the noise reduction stage
    /// degrades to spectral gating instead.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EnhanceError::ModelUnavailable { .. } | EnhanceError::ModelFailed { .. }
        )
    }

    /// Process exit code used by the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            EnhanceError::InvalidParameter { .. } | EnhanceError::Cancelled { .. } => 1,
            EnhanceError::FileNotFound { .. } => 2,
            EnhanceError::InvalidFormat { .. }
            | EnhanceError::UnsupportedChannels { .. }
            | EnhanceError::FileCorrupted { .. } => 3,
            EnhanceError::Analysis { .. }
            | EnhanceError::ModelUnavailable { .. }
            | EnhanceError::ModelFailed { .. }
            | EnhanceError::ProcessingFailed { .. }
            | EnhanceError::Serialization(_) => 4,
            EnhanceError::InsufficientSpace { .. }
            | EnhanceError::OutputWrite { .. }
            | EnhanceError::Io(_) => 5,
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            EnhanceError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            EnhanceError::InvalidFormat { .. } => vec![
                "Only WAV files are supported",
                "Convert the file to WAV (PCM or 32-bit float) first",
            ],
            EnhanceError::UnsupportedChannels { .. } => vec![
                "Downmix the recording to mono or stereo",
            ],
            EnhanceError::FileCorrupted { .. } => vec![
                "Check if the file plays in another application",
                "The file may be truncated - try re-exporting from source",
            ],
            EnhanceError::ModelUnavailable { .. } | EnhanceError::ModelFailed { .. } => vec![
                "Run with --no-ai to use spectral gating only",
                "Check that the build includes the 'rnnoise' feature",
            ],
            EnhanceError::ProcessingFailed { .. } => vec![
                "Try a lighter quality level (-q light)",
                "Check the input for NaN or infinite samples",
            ],
            EnhanceError::InsufficientSpace { .. } => vec![
                "Free up disk space",
                "Write the output to a different location with -o",
            ],
            EnhanceError::OutputWrite { .. } => vec![
                "Check write permissions for the output directory",
                "Use --force to overwrite an existing output file",
            ],
            EnhanceError::InvalidParameter { .. } => vec![
                "Run with --help to see accepted values",
            ],
            _ => vec![],
        }
    }
}
