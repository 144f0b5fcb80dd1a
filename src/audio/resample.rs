// Sample rate conversion for decoded clips
// Buffers are converted once at load time to the engine's rate

use rubato::{FftFixedIn, Resampler};

use super::buffer::AudioBuffer;

const CHUNK_FRAMES: usize = 1024;

/// Resample a whole buffer to `target_rate`
pub fn resample(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer, String> {
    let source_rate = buffer.sample_rate();
    let channels = buffer.channels() as usize;
    if source_rate == target_rate {
        return Ok(buffer.clone());
    }

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        CHUNK_FRAMES,
        2,
        channels,
    )
    .map_err(|e| format!("Failed to create resampler: {}", e))?;

    let planar = deinterleave(buffer.samples(), channels);
    let total_in = buffer.frames();
    let expected_out = (total_in as u64 * target_rate as u64 / source_rate as u64) as usize;
    let delay = resampler.output_delay();

    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected_out + delay); channels];
    let mut position = 0;

    while total_in - position >= resampler.input_frames_next() {
        let take = resampler.input_frames_next();
        let chunk: Vec<&[f32]> = planar.iter().map(|p| &p[position..position + take]).collect();
        let out = resampler
            .process(&chunk, None)
            .map_err(|e| format!("Resampling failed: {}", e))?;
        append(&mut output, out);
        position += take;
    }

    if position < total_in {
        let tail: Vec<&[f32]> = planar.iter().map(|p| &p[position..]).collect();
        let out = resampler
            .process_partial(Some(&tail), None)
            .map_err(|e| format!("Resampling failed: {}", e))?;
        append(&mut output, out);
    }

    // Flush the filter until the delayed tail has come out
    while output[0].len() < expected_out + delay {
        let out = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| format!("Resampling failed: {}", e))?;
        if out[0].is_empty() {
            break;
        }
        append(&mut output, out);
    }

    let mut interleaved = Vec::with_capacity(expected_out * channels);
    for frame in delay..(delay + expected_out).min(output[0].len()) {
        for plane in &output {
            interleaved.push(plane[frame]);
        }
    }

    Ok(AudioBuffer::new(interleaved, target_rate, channels as u16))
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let mut planar = vec![Vec::with_capacity(samples.len() / channels); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            planar[ch].push(*sample);
        }
    }
    planar
}

fn append(output: &mut [Vec<f32>], chunk: Vec<Vec<f32>>) {
    for (plane, part) in output.iter_mut().zip(chunk) {
        plane.extend(part);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_passthrough() {
        let buffer = AudioBuffer::new(vec![0.25; 200], 48000, 2);
        assert_eq!(resample(&buffer, 48000).unwrap(), buffer);
    }

    #[test]
    fn test_upsample_keeps_duration() {
        let buffer = AudioBuffer::new(vec![0.5; 22050], 22050, 1);
        let resampled = resample(&buffer, 44100).unwrap();

        assert_eq!(resampled.sample_rate(), 44100);
        assert_eq!(resampled.channels(), 1);
        assert_eq!(resampled.frames(), 44100);
        // A constant signal stays constant away from the edges
        let middle = resampled.samples()[22050];
        assert!((middle - 0.5).abs() < 0.01, "got {}", middle);
    }

    #[test]
    fn test_downsample_stereo() {
        let buffer = AudioBuffer::new(vec![0.0; 48000 * 2], 48000, 2);
        let resampled = resample(&buffer, 16000).unwrap();
        assert_eq!(resampled.channels(), 2);
        assert_eq!(resampled.frames(), 16000);
    }
}
