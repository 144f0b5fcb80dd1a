// Error types shared across the soundboard
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SoundboardError {
    /// No usable audio output, or the engine refused to resume
    #[error("audio engine unavailable: {0}")]
    EngineInit(String),

    #[error("failed to fetch {id}: {reason}")]
    Fetch { id: String, reason: String },

    #[error("failed to decode {id}: {reason}")]
    Decode { id: String, reason: String },

    #[error("failed to list clips: {0}")]
    Listing(String),

    #[error("unknown clip: {0}")]
    UnknownClip(String),

    #[error("settings error: {0}")]
    Settings(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SoundboardError {
    /// Errors that only affect one clip and never abort loading
    pub fn is_per_clip(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Decode { .. })
    }
}

pub type Result<T> = std::result::Result<T, SoundboardError>;
