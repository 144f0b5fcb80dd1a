// Audio output using cpal
// The stream lives on its own thread (cpal streams are not Send); the
// render callback pulls mixed voices straight from the shared mixer

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use super::buffer::AudioBuffer;
use super::engine::{AudioEngine, EngineState};
use super::mixer::{Mixer, StartParams, Voice};
use crate::error::{Result, SoundboardError};

enum StreamCommand {
    Play(mpsc::Sender<std::result::Result<(), String>>),
}

pub struct CpalEngine {
    mixer: Arc<Mutex<Mixer>>,
    control: Mutex<mpsc::Sender<StreamCommand>>,
    state: Mutex<EngineState>,
    sample_rate: u32,
    channels: u16,
}

impl CpalEngine {
    /// Open the default output device. The stream starts suspended.
    pub fn new() -> Result<Self> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (control_tx, control_rx) = mpsc::channel::<StreamCommand>();

        thread::Builder::new()
            .name("soundboard-audio".to_string())
            .spawn(move || {
                let (stream, mixer, sample_rate, channels) = match open_stream() {
                    Ok(opened) => opened,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok((mixer, sample_rate, channels)));

                // Runs until the engine (and with it the sender) is dropped
                for command in control_rx {
                    match command {
                        StreamCommand::Play(reply) => {
                            let result = stream
                                .play()
                                .map_err(|e| format!("Failed to start stream: {}", e));
                            let _ = reply.send(result);
                        }
                    }
                }
                tracing::debug!("Audio thread exiting");
            })
            .map_err(|e| SoundboardError::EngineInit(format!("Failed to spawn audio thread: {}", e)))?;

        let (mixer, sample_rate, channels) = ready_rx
            .recv()
            .map_err(|_| SoundboardError::EngineInit("audio thread exited during setup".to_string()))?
            .map_err(SoundboardError::EngineInit)?;

        tracing::info!(sample_rate, channels, "Audio output opened");

        Ok(Self {
            mixer,
            control: Mutex::new(control_tx),
            state: Mutex::new(EngineState::Suspended),
            sample_rate,
            channels,
        })
    }
}

fn open_stream() -> std::result::Result<(Stream, Arc<Mutex<Mixer>>, u32, u16), String> {
    let host = cpal::default_host();

    let device = host.default_output_device()
        .ok_or("No output device available")?;

    let config = device.default_output_config()
        .map_err(|e| format!("Failed to get default output config: {}", e))?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels();
    let mixer = Arc::new(Mutex::new(Mixer::new(sample_rate, channels)));

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), mixer.clone())?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), mixer.clone())?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config.into(), mixer.clone())?,
        format => return Err(format!("Unsupported sample format: {:?}", format)),
    };

    // Some hosts start streams on creation; hold output until resumed
    if let Err(e) = stream.pause() {
        tracing::debug!("Stream could not be paused after creation: {}", e);
    }

    Ok((stream, mixer, sample_rate, channels))
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &cpal::Device,
    config: &StreamConfig,
    mixer: Arc<Mutex<Mixer>>,
) -> std::result::Result<Stream, String> {
    let mut scratch: Vec<f32> = Vec::new();

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            mixer.lock().render(&mut scratch);
            for (sample, value) in data.iter_mut().zip(&scratch) {
                *sample = T::from_sample(value.clamp(-1.0, 1.0));
            }
        },
        move |err| {
            tracing::error!("Audio output error: {}", err);
        },
        None,
    ).map_err(|e| format!("Failed to build output stream: {}", e))
}

impl AudioEngine for CpalEngine {
    fn state(&self) -> EngineState {
        *self.state.lock()
    }

    fn resume(&self) -> Result<()> {
        if *self.state.lock() == EngineState::Running {
            return Ok(());
        }

        // The state lock is not held while the audio thread answers;
        // a second Play on a running stream is harmless
        let (reply_tx, reply_rx) = mpsc::channel();
        self.control
            .lock()
            .send(StreamCommand::Play(reply_tx))
            .map_err(|_| SoundboardError::EngineInit("audio thread is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| SoundboardError::EngineInit("audio thread is gone".to_string()))?
            .map_err(SoundboardError::EngineInit)?;

        *self.state.lock() = EngineState::Running;
        tracing::debug!("Audio output resumed");
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.mixer.lock().time()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn start_voice(&self, buffer: Arc<AudioBuffer>, params: StartParams) -> Result<Voice> {
        let mut mixer = self.mixer.lock();
        let voice = Voice::new(buffer, params, mixer.time());
        mixer.add(voice.clone());
        Ok(voice)
    }

    fn name(&self) -> &'static str {
        "cpal"
    }
}
