//! WAV file I/O
//!
//! The loader validates everything the pipeline assumes (WAV container, one or
//! two channels, at least one frame) and the exporter writes the final buffer,
//! upgrading integer output to at least 24-bit.

use std::fs;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::engine::buffer::AudioBuffer;
use crate::error::{EnhanceError, Result};

/// Minimum bit depth written by the exporter
pub const MIN_EXPORT_BIT_DEPTH: u16 = 24;

/// Suffix appended to the input stem for the default output path
pub const OUTPUT_SUFFIX: &str = "_enhanced";

/// ENOSPC on Linux and macOS
const NO_SPACE_OS_ERROR: i32 = 28;

/// Export options
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Force a bit depth instead of max(input, 24)
    pub bit_depth: Option<u16>,
    /// Replace an existing file at the output path
    pub overwrite: bool,
}

/// Load a WAV file into an [`AudioBuffer`]
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `InvalidFormat` - If the file is not a WAV file or uses an unsupported encoding
/// * `UnsupportedChannels` - If the audio has more than 2 channels
/// * `FileCorrupted` - If the sample data cannot be decoded or is empty
pub fn load_wav(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(EnhanceError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let is_wav = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);
    if !is_wav {
        return Err(EnhanceError::InvalidFormat {
            reason: format!("{} is not a .wav file", path.display()),
        });
    }

    let reader = WavReader::open(path).map_err(|e| decode_error(path, e))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    if channels == 0 || channels > 2 {
        return Err(EnhanceError::UnsupportedChannels { channels });
    }

    let interleaved = read_samples_as_f32(reader, spec, path)?;
    if interleaved.len() < channels {
        return Err(EnhanceError::FileCorrupted {
            path: path.display().to_string(),
            reason: "file contains no audio frames".to_string(),
        });
    }

    let buffer = AudioBuffer::from_channels(deinterleave(&interleaved, channels), spec.sample_rate)?
        .with_bit_depth(spec.bits_per_sample);

    debug!(
        path = %path.display(),
        channels,
        sample_rate = spec.sample_rate,
        bits = spec.bits_per_sample,
        frames = buffer.len(),
        "loaded wav"
    );

    Ok(buffer)
}

/// Default output path: `<dir>/<stem>_enhanced.wav`
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}{}.wav", stem, OUTPUT_SUFFIX))
}

/// Bit depth the exporter will use for a buffer
pub fn export_bit_depth(buffer: &AudioBuffer, options: &ExportOptions) -> u16 {
    options
        .bit_depth
        .unwrap_or_else(|| buffer.bit_depth().max(MIN_EXPORT_BIT_DEPTH))
}

/// Write an [`AudioBuffer`] to a WAV file
///
/// 32-bit output is written as IEEE float, 16 and 24-bit as integer PCM. A
/// failed write removes the partial file.
pub fn export_wav(buffer: &AudioBuffer, path: &Path, options: &ExportOptions) -> Result<()> {
    if path.exists() && !options.overwrite {
        return Err(EnhanceError::OutputWrite {
            path: path.display().to_string(),
            reason: "file already exists".to_string(),
        });
    }

    let bit_depth = export_bit_depth(buffer, options);
    if !matches!(bit_depth, 16 | 24 | 32) {
        return Err(EnhanceError::InvalidParameter {
            param: "bit_depth".to_string(),
            value: bit_depth.to_string(),
            expected: "16, 24 or 32".to_string(),
        });
    }

    let result = write_samples(buffer, path, bit_depth);
    if result.is_err() {
        let _ = fs::remove_file(path);
    }
    result
}

fn write_samples(buffer: &AudioBuffer, path: &Path, bit_depth: u16) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: bit_depth,
        sample_format: if bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let mut writer = WavWriter::create(path, spec).map_err(|e| write_error(path, e))?;
    let interleaved = buffer.to_interleaved();

    match bit_depth {
        16 => {
            for sample in interleaved {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(|e| write_error(path, e))?;
            }
        }
        24 => {
            for sample in interleaved {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(|e| write_error(path, e))?;
            }
        }
        _ => {
            for sample in interleaved {
                writer.write_sample(sample).map_err(|e| write_error(path, e))?;
            }
        }
    }

    writer.finalize().map_err(|e| write_error(path, e))
}

/// Generate a mono sine tone
pub fn generate_test_tone(
    frequency: f32,
    amplitude: f32,
    duration_secs: f32,
    sample_rate: u32,
) -> Result<AudioBuffer> {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;
    let samples = (0..num_samples)
        .map(|i| amplitude * (angular_freq * i as f64).sin() as f32)
        .collect();
    AudioBuffer::from_channels(vec![samples], sample_rate)
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn decode_error(path: &Path, err: hound::Error) -> EnhanceError {
    match err {
        hound::Error::FormatError(reason) => EnhanceError::InvalidFormat {
            reason: format!("{}: {}", path.display(), reason),
        },
        hound::Error::Unsupported => EnhanceError::InvalidFormat {
            reason: format!("{}: unsupported WAV encoding", path.display()),
        },
        other => EnhanceError::FileCorrupted {
            path: path.display().to_string(),
            reason: other.to_string(),
        },
    }
}

fn write_error(path: &Path, err: hound::Error) -> EnhanceError {
    match err {
        hound::Error::IoError(io) if io.raw_os_error() == Some(NO_SPACE_OS_ERROR) => {
            EnhanceError::InsufficientSpace {
                path: path.display().to_string(),
            }
        }
        other => EnhanceError::OutputWrite {
            path: path.display().to_string(),
            reason: other.to_string(),
        },
    }
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    spec: WavSpec,
    path: &Path,
) -> Result<Vec<f32>> {
    let scale = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => None,
        (SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => Some(2f32.powi(bits as i32 - 1)),
        (format, bits) => {
            return Err(EnhanceError::InvalidFormat {
                reason: format!("{}-bit {:?} samples are not supported", bits, format),
            })
        }
    };

    let decoded = match scale {
        None => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>(),
        Some(scale) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / scale))
            .collect::<std::result::Result<Vec<f32>, _>>(),
    };

    decoded.map_err(|e| EnhanceError::FileCorrupted {
        path: path.display().to_string(),
        reason: format!("failed to decode samples: {}", e),
    })
}

/// De-interleave samples from [L,R,L,R,...] to [[L,L,...], [R,R,...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut result = vec![Vec::with_capacity(frames); channels];

    for frame in samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            result[ch].push(*sample);
        }
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_output_path() {
        let out = default_output_path(Path::new("/data/take1.wav"));
        assert_eq!(out, PathBuf::from("/data/take1_enhanced.wav"));
    }

    #[test]
    fn test_round_trip_upgrades_to_24_bit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let original = generate_test_tone(440.0, 0.5, 0.25, 44100)
            .unwrap()
            .with_bit_depth(16);
        export_wav(&original, &path, &ExportOptions::default()).unwrap();

        let imported = load_wav(&path).unwrap();
        assert_eq!(imported.bit_depth(), 24);
        assert_eq!(imported.len(), original.len());
        assert_eq!(imported.sample_rate(), 44100);
        for (orig, imp) in original.channel(0).iter().zip(imported.channel(0)) {
            assert!((orig - imp).abs() < 0.001, "Sample mismatch: {} vs {}", orig, imp);
        }
    }

    #[test]
    fn test_round_trip_float_stereo() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let original = AudioBuffer::from_channels(
            vec![vec![0.25, -0.5, 0.75], vec![-0.25, 0.5, -0.75]],
            48000,
        )
        .unwrap();

        export_wav(&original, &path, &ExportOptions::default()).unwrap();
        let imported = load_wav(&path).unwrap();
        assert_eq!(imported.channel_data(), original.channel_data());
        assert_eq!(imported.bit_depth(), 32);
    }

    #[test]
    fn test_export_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exists.wav");
        std::fs::write(&path, b"x").unwrap();
        let buffer = generate_test_tone(440.0, 0.5, 0.01, 8000).unwrap();

        let err = export_wav(&buffer, &path, &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, EnhanceError::OutputWrite { .. }));
        // the pre-existing file is left alone
        assert_eq!(std::fs::read(&path).unwrap(), b"x");
    }

    #[test]
    fn test_load_rejects_non_wav_and_missing() {
        let dir = tempdir().unwrap();
        let mp3 = dir.path().join("song.mp3");
        std::fs::write(&mp3, b"ID3").unwrap();
        assert!(matches!(
            load_wav(&mp3).unwrap_err(),
            EnhanceError::InvalidFormat { .. }
        ));
        assert!(matches!(
            load_wav(&dir.path().join("missing.wav")).unwrap_err(),
            EnhanceError::FileNotFound { .. }
        ));
    }

    #[test]
    fn test_load_rejects_garbage_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"definitely not riff data").unwrap();
        let err = load_wav(&path).unwrap_err();
        assert!(matches!(
            err,
            EnhanceError::InvalidFormat { .. } | EnhanceError::FileCorrupted { .. }
        ));
    }

    #[test]
    fn test_load_rejects_multichannel() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("surround.wav");
        let spec = WavSpec {
            channels: 6,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..60 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        assert!(matches!(
            load_wav(&path).unwrap_err(),
            EnhanceError::UnsupportedChannels { channels: 6 }
        ));
    }
}
