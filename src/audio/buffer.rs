// Decoded audio held in memory for the whole session

use std::time::Duration;

/// Immutable interleaved f32 samples plus their format
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    /// Build a buffer from interleaved samples.
    /// Trailing samples that don't fill a whole frame are dropped.
    pub fn new(mut samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);
        Self {
            samples,
            sample_rate: sample_rate.max(1),
            channels,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of frames (one sample per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Frame index for a position in seconds, clamped to the buffer length
    pub fn frame_at_seconds(&self, seconds: f64) -> usize {
        if !seconds.is_finite() || seconds <= 0.0 {
            return 0;
        }
        let frame = (seconds * self.sample_rate as f64).round() as usize;
        frame.min(self.frames())
    }

    /// Samples of one frame, or None past the end
    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        let ch = self.channels as usize;
        self.samples.get(index * ch..(index + 1) * ch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_frame_is_dropped() {
        let buffer = AudioBuffer::new(vec![0.1, 0.2, 0.3, 0.4, 0.5], 48000, 2);
        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.samples().len(), 4);
    }

    #[test]
    fn test_duration_and_frame_lookup() {
        let buffer = AudioBuffer::new(vec![0.0; 2000], 1000, 1);
        assert_eq!(buffer.duration(), Duration::from_secs(2));
        assert_eq!(buffer.frame_at_seconds(1.5), 1500);
        assert_eq!(buffer.frame_at_seconds(-1.0), 0);
        // Offsets past the end clamp to the end
        assert_eq!(buffer.frame_at_seconds(10.0), 2000);
    }

    #[test]
    fn test_frame_access() {
        let buffer = AudioBuffer::new(vec![1.0, -1.0, 0.5, -0.5], 44100, 2);
        assert_eq!(buffer.frame(1), Some(&[0.5, -0.5][..]));
        assert_eq!(buffer.frame(2), None);
    }
}
