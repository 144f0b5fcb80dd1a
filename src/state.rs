// Application state management
use std::path::PathBuf;
use std::sync::Arc;

use crate::board::Soundboard;

/// Shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub sounds_dir: Arc<PathBuf>,
    pub public_dir: Arc<PathBuf>,
    /// None when the server runs without host playback
    pub board: Option<Soundboard>,
}

impl AppState {
    pub fn new(sounds_dir: PathBuf, public_dir: PathBuf, board: Option<Soundboard>) -> Self {
        Self {
            sounds_dir: Arc::new(sounds_dir),
            public_dir: Arc::new(public_dir),
            board,
        }
    }
}
