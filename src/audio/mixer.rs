// Voices and the mixer that sums them into the output
// A voice is one playing instance of a buffer with its own gain automation

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

use super::buffer::AudioBuffer;
use super::gain::GainAutomation;

/// Where a voice starts and stops inside its buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartParams {
    /// Seconds into the buffer to start reading from
    pub offset: f64,
    /// Optional cap on how long to play, in seconds
    pub duration: Option<f64>,
    pub initial_gain: f32,
}

impl Default for StartParams {
    fn default() -> Self {
        Self {
            offset: 0.0,
            duration: None,
            initial_gain: 1.0,
        }
    }
}

struct Playhead {
    gain: GainAutomation,
    position: usize,
    end: usize,
    stopped: bool,
}

struct VoiceInner {
    buffer: Arc<AudioBuffer>,
    playhead: Mutex<Playhead>,
    ended: watch::Sender<bool>,
}

/// Shared handle to a playing voice; clones refer to the same voice
#[derive(Clone)]
pub struct Voice {
    inner: Arc<VoiceInner>,
}

impl Voice {
    pub fn new(buffer: Arc<AudioBuffer>, params: StartParams, now: f64) -> Self {
        let start = buffer.frame_at_seconds(params.offset);
        let end = match params.duration {
            Some(d) => buffer.frame_at_seconds(params.offset + d.max(0.0)),
            None => buffer.frames(),
        };

        let mut gain = GainAutomation::constant(params.initial_gain);
        gain.set_value_at(params.initial_gain, now);

        let (ended, _) = watch::channel(false);
        Self {
            inner: Arc::new(VoiceInner {
                buffer,
                playhead: Mutex::new(Playhead {
                    gain,
                    position: start,
                    end,
                    stopped: false,
                }),
                ended,
            }),
        }
    }

    pub fn buffer(&self) -> &Arc<AudioBuffer> {
        &self.inner.buffer
    }

    /// Current read position in buffer frames
    pub fn position(&self) -> usize {
        self.inner.playhead.lock().position
    }

    pub fn gain_at(&self, t: f64) -> f32 {
        self.inner.playhead.lock().gain.value_at(t)
    }

    pub fn set_gain(&self, value: f32, at: f64) {
        self.inner.playhead.lock().gain.set_value_at(value, at);
    }

    pub fn ramp_gain(&self, target: f32, now: f64, end_time: f64) {
        self.inner
            .playhead
            .lock()
            .gain
            .linear_ramp_to(target, now, end_time);
    }

    pub fn cancel_and_hold(&self, now: f64) -> f32 {
        self.inner.playhead.lock().gain.cancel_and_hold(now)
    }

    /// Stop output immediately. The mixer drops the voice on its next pass.
    pub fn stop(&self) {
        self.inner.playhead.lock().stopped = true;
        self.inner.ended.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        *self.inner.ended.borrow()
    }

    /// Resolves once the voice reached the end of its range or was stopped
    pub fn ended(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.inner.ended.subscribe();
        async move {
            // A dropped sender means the voice is gone, which counts as ended
            let _ = rx.wait_for(|ended| *ended).await;
        }
    }

    /// Add this voice into `out` (interleaved, `channels` wide) starting at
    /// engine time `start_time`. Returns false once the voice is finished.
    fn render_into(&self, out: &mut [f32], channels: usize, sample_rate: u32, start_time: f64) -> bool {
        let mut head = self.inner.playhead.lock();
        if head.stopped {
            return false;
        }

        let buffer = &self.inner.buffer;
        let src_channels = buffer.channels() as usize;
        let samples = buffer.samples();
        let step = 1.0 / sample_rate as f64;

        for (i, frame) in out.chunks_mut(channels).enumerate() {
            if head.position >= head.end {
                break;
            }
            let gain = head.gain.value_at(start_time + i as f64 * step);
            let base = head.position * src_channels;
            for (ch, sample) in frame.iter_mut().enumerate() {
                *sample += samples[base + ch % src_channels] * gain;
            }
            head.position += 1;
        }

        if head.position >= head.end {
            drop(head);
            self.inner.ended.send_replace(true);
            return false;
        }
        true
    }
}

/// Sums active voices into interleaved output
pub struct Mixer {
    voices: Vec<Voice>,
    sample_rate: u32,
    channels: u16,
    frames_rendered: u64,
}

impl Mixer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            voices: Vec::new(),
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            frames_rendered: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn add(&mut self, voice: Voice) {
        self.voices.push(voice);
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Seconds of audio rendered so far; the clock of a device-driven engine
    pub fn time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    /// Render using the mixer's own frame clock
    pub fn render(&mut self, out: &mut [f32]) {
        let start = self.time();
        self.render_at(out, start);
    }

    /// Render with gain automation evaluated from `start_time`
    pub fn render_at(&mut self, out: &mut [f32], start_time: f64) {
        out.fill(0.0);
        let channels = self.channels as usize;
        let sample_rate = self.sample_rate;
        self.voices
            .retain(|voice| voice.render_into(out, channels, sample_rate, start_time));
        self.frames_rendered += (out.len() / channels) as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_buffer(frames: usize, sample_rate: u32) -> Arc<AudioBuffer> {
        let samples = (0..frames).map(|i| i as f32 / frames as f32).collect();
        Arc::new(AudioBuffer::new(samples, sample_rate, 1))
    }

    #[test]
    fn test_voice_starts_at_offset() {
        let buffer = ramp_buffer(1000, 100);
        let voice = Voice::new(
            buffer.clone(),
            StartParams { offset: 2.0, ..Default::default() },
            0.0,
        );
        assert_eq!(voice.position(), 200);

        let mut mixer = Mixer::new(100, 1);
        mixer.add(voice.clone());
        let mut out = vec![0.0; 3];
        mixer.render(&mut out);

        assert_eq!(out, vec![0.2, 0.201, 0.202]);
        assert_eq!(voice.position(), 203);
    }

    #[test]
    fn test_duration_cap_ends_voice() {
        let buffer = ramp_buffer(1000, 100);
        let voice = Voice::new(
            buffer,
            StartParams { offset: 0.0, duration: Some(0.05), initial_gain: 1.0 },
            0.0,
        );
        let mut mixer = Mixer::new(100, 1);
        mixer.add(voice.clone());

        let mut out = vec![0.0; 10];
        mixer.render(&mut out);

        assert!(voice.is_finished());
        assert_eq!(mixer.active_voices(), 0);
        // Only five frames were inside the cap
        assert_eq!(out[5..], [0.0f32; 5]);
    }

    #[test]
    fn test_gain_applies_per_frame() {
        let buffer = Arc::new(AudioBuffer::new(vec![1.0; 100], 10, 1));
        let voice = Voice::new(buffer, StartParams { initial_gain: 0.0, ..Default::default() }, 0.0);
        voice.ramp_gain(1.0, 0.0, 1.0);

        let mut mixer = Mixer::new(10, 1);
        mixer.add(voice);
        let mut out = vec![0.0; 11];
        mixer.render(&mut out);

        assert_eq!(out[0], 0.0);
        assert!((out[5] - 0.5).abs() < 1e-5);
        assert_eq!(out[10], 1.0);
    }

    #[test]
    fn test_mono_source_fills_all_output_channels() {
        let buffer = Arc::new(AudioBuffer::new(vec![0.5; 10], 10, 1));
        let mut mixer = Mixer::new(10, 2);
        mixer.add(Voice::new(buffer, StartParams::default(), 0.0));

        let mut out = vec![0.0; 4];
        mixer.render(&mut out);
        assert_eq!(out, vec![0.5; 4]);
    }

    #[test]
    fn test_stopped_voice_is_dropped() {
        let buffer = ramp_buffer(100, 10);
        let voice = Voice::new(buffer, StartParams::default(), 0.0);
        let mut mixer = Mixer::new(10, 1);
        mixer.add(voice.clone());

        voice.stop();
        let mut out = vec![0.0; 4];
        mixer.render(&mut out);

        assert_eq!(mixer.active_voices(), 0);
        assert_eq!(out, vec![0.0; 4]);
        assert!(voice.is_finished());
    }

    #[tokio::test]
    async fn test_ended_resolves_after_stop() {
        let voice = Voice::new(ramp_buffer(10, 10), StartParams::default(), 0.0);
        let ended = voice.ended();
        voice.stop();
        ended.await;
    }
}
