//! Chunked processing with crossfaded seams
//!
//! Long recordings can be processed in overlapping windows so that no single
//! allocation has to cover the whole file. Consecutive chunks overlap and the
//! overlap region is blended linearly from the earlier chunk into the later
//! one, so seams never produce a step discontinuity.

use crate::engine::buffer::AudioBuffer;
use crate::error::{EnhanceError, Result};

/// Process `buffer` in chunks of `chunk_len` frames that overlap by `overlap` frames
///
/// `process` must return a buffer with the same shape as the chunk it was
/// given. Buffers no longer than one chunk are passed through `process` whole.
pub fn process_chunked<F>(
    buffer: &AudioBuffer,
    chunk_len: usize,
    overlap: usize,
    mut process: F,
) -> Result<AudioBuffer>
where
    F: FnMut(&AudioBuffer) -> Result<AudioBuffer>,
{
    if chunk_len == 0 || overlap >= chunk_len {
        return Err(EnhanceError::InvalidParameter {
            param: "overlap".to_string(),
            value: format!("{} (chunk {})", overlap, chunk_len),
            expected: "overlap smaller than a non-empty chunk".to_string(),
        });
    }

    let total = buffer.len();
    if total <= chunk_len {
        return process(buffer);
    }

    let step = chunk_len - overlap;
    let mut output = vec![vec![0.0_f32; total]; buffer.channels()];
    // end of the region already written to `output`
    let mut written: usize = 0;
    let mut start = 0;

    loop {
        let end = (start + chunk_len).min(total);
        let chunk = buffer.with_samples(
            buffer
                .channel_data()
                .iter()
                .map(|ch| ch[start..end].to_vec())
                .collect(),
        )?;
        let processed = process(&chunk)?;
        if processed.len() != chunk.len() || processed.channels() != chunk.channels() {
            return Err(EnhanceError::processing(
                "chunk",
                format!(
                    "chunk processor changed shape from {}x{} to {}x{}",
                    chunk.channels(),
                    chunk.len(),
                    processed.channels(),
                    processed.len()
                ),
            ));
        }

        let fade_len = written.saturating_sub(start);
        for (out_ch, new_ch) in output.iter_mut().zip(processed.channel_data()) {
            for (offset, &new) in new_ch.iter().enumerate() {
                let idx = start + offset;
                if offset < fade_len {
                    let w = (offset as f32 + 0.5) / fade_len as f32;
                    let old = out_ch[idx];
                    out_ch[idx] = old + (new - old) * w;
                } else {
                    out_ch[idx] = new;
                }
            }
        }

        written = end;
        if end == total {
            break;
        }
        start += step;
    }

    buffer.with_samples(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> AudioBuffer {
        AudioBuffer::from_channels(vec![(0..len).map(|i| i as f32 / len as f32).collect()], 8000)
            .unwrap()
    }

    #[test]
    fn test_identity_processing_is_lossless() {
        let input = ramp(10_000);
        let output = process_chunked(&input, 1024, 128, |c| Ok(c.clone())).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_short_buffer_is_single_chunk() {
        let input = ramp(100);
        let mut calls = 0;
        process_chunked(&input, 1024, 128, |c| {
            calls += 1;
            Ok(c.clone())
        })
        .unwrap();
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_seams_are_crossfaded() {
        // every chunk is replaced by a constant equal to its call index, so the
        // output must move smoothly from one constant to the next in overlaps
        let input = ramp(3000);
        let mut index = 0.0_f32;
        let output = process_chunked(&input, 1000, 200, |c| {
            index += 1.0;
            c.with_samples(vec![vec![index; c.len()]])
        })
        .unwrap();

        let samples = output.channel(0);
        let max_step = samples
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .fold(0.0_f32, f32::max);
        assert!(max_step < 0.01, "seam step too large: {}", max_step);
        assert_eq!(samples[0], 1.0);
    }

    #[test]
    fn test_uneven_tail_fades_only_the_overlap() {
        // 2500 frames, step 900: chunks start at 0, 900 and 1800 (short tail)
        let input = ramp(2500);
        let mut lens = Vec::new();
        let output = process_chunked(&input, 1000, 100, |c| {
            lens.push(c.len());
            c.with_samples(vec![vec![lens.len() as f32; c.len()]])
        })
        .unwrap();

        assert_eq!(lens, vec![1000, 1000, 700]);
        let samples = output.channel(0);
        assert_eq!(samples.len(), 2500);
        assert!(samples[1850] > 2.0 && samples[1850] < 3.0);
        assert_eq!(samples[1900], 3.0);
        assert_eq!(samples[2499], 3.0);
    }

    #[test]
    fn test_rejects_bad_overlap() {
        let input = ramp(100);
        assert!(process_chunked(&input, 64, 64, |c| Ok(c.clone())).is_err());
    }

    #[test]
    fn test_shape_change_is_an_error() {
        let input = ramp(5000);
        let err = process_chunked(&input, 1000, 100, |c| {
            c.with_samples(vec![vec![0.0; c.len() / 2]])
        })
        .unwrap_err();
        assert!(matches!(err, EnhanceError::ProcessingFailed { .. }));
    }
}
