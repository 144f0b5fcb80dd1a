// Playback module
// The fade state machine and the single-active-clip session

pub mod controller;
mod state;

pub use controller::{ClipSnapshot, LoadReport, PlaybackController, ToggleOutcome};
