// Audio engine abstraction
// The controller drives playback through this trait: a clock, a
// suspended/running state and voices with gain automation

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;

use super::buffer::AudioBuffer;
use super::mixer::{Mixer, StartParams, Voice};
use crate::error::{Result, SoundboardError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Output is paused until the first user interaction resumes it
    Suspended,
    Running,
}

pub trait AudioEngine: Send + Sync + 'static {
    fn state(&self) -> EngineState;

    fn resume(&self) -> Result<()>;

    /// Engine clock in seconds; gain ramps are scheduled against it
    fn current_time(&self) -> f64;

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Create a voice for `buffer` and connect it to the output
    fn start_voice(&self, buffer: Arc<AudioBuffer>, params: StartParams) -> Result<Voice>;

    fn name(&self) -> &'static str;
}

/// Engine without an output device. Voices only advance when
/// `render` is called; the clock follows the tokio clock.
pub struct HeadlessEngine {
    mixer: Mutex<Mixer>,
    state: Mutex<EngineState>,
    epoch: Instant,
}

impl HeadlessEngine {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            mixer: Mutex::new(Mixer::new(sample_rate, channels)),
            state: Mutex::new(EngineState::Suspended),
            epoch: Instant::now(),
        }
    }

    /// Pull `frames` frames of mixed output at the current engine time
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let now = self.current_time();
        let mut mixer = self.mixer.lock();
        let mut out = vec![0.0; frames * mixer.channels() as usize];
        mixer.render_at(&mut out, now);
        out
    }

    pub fn active_voices(&self) -> usize {
        self.mixer.lock().active_voices()
    }
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new(44100, 2)
    }
}

impl AudioEngine for HeadlessEngine {
    fn state(&self) -> EngineState {
        *self.state.lock()
    }

    fn resume(&self) -> Result<()> {
        *self.state.lock() = EngineState::Running;
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn sample_rate(&self) -> u32 {
        self.mixer.lock().sample_rate()
    }

    fn channels(&self) -> u16 {
        self.mixer.lock().channels()
    }

    fn start_voice(&self, buffer: Arc<AudioBuffer>, params: StartParams) -> Result<Voice> {
        if self.state() != EngineState::Running {
            return Err(SoundboardError::EngineInit("engine is suspended".to_string()));
        }
        let voice = Voice::new(buffer, params, self.current_time());
        self.mixer.lock().add(voice.clone());
        Ok(voice)
    }

    fn name(&self) -> &'static str {
        "headless"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_headless_starts_suspended() {
        let engine = HeadlessEngine::new(1000, 1);
        assert_eq!(engine.state(), EngineState::Suspended);

        let buffer = Arc::new(AudioBuffer::new(vec![1.0; 10], 1000, 1));
        assert!(engine.start_voice(buffer.clone(), StartParams::default()).is_err());

        engine.resume().unwrap();
        assert_eq!(engine.state(), EngineState::Running);
        assert!(engine.start_voice(buffer, StartParams::default()).is_ok());
        assert_eq!(engine.active_voices(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_headless_clock_follows_tokio_time() {
        let engine = HeadlessEngine::new(1000, 1);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!((engine.current_time() - 0.25).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_mixes_voices() {
        let engine = HeadlessEngine::new(1000, 1);
        engine.resume().unwrap();
        let buffer = Arc::new(AudioBuffer::new(vec![0.25; 100], 1000, 1));
        engine.start_voice(buffer.clone(), StartParams::default()).unwrap();
        engine.start_voice(buffer, StartParams::default()).unwrap();

        let out = engine.render(4);
        assert_eq!(out, vec![0.5; 4]);
    }
}
