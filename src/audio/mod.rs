// Audio playback module
// Uses Symphonia for decoding and cpal for output

pub mod buffer;
pub mod decoder;
pub mod engine;
pub mod gain;
pub mod mixer;
pub mod output;
pub mod resample;

pub use buffer::AudioBuffer;
pub use engine::{AudioEngine, EngineState, HeadlessEngine};
pub use mixer::{StartParams, Voice};
pub use output::CpalEngine;
