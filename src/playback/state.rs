// Per-clip playback state owned by the controller
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::audio::Voice;
use crate::clip::{Clip, ClipStatus};

pub(crate) struct PlaybackState {
    pub status: watch::Sender<ClipStatus>,
    /// Connected voice; only present while not idle
    pub voice: Option<Voice>,
    pub started_at: Option<f64>,
    /// Bumped on every start so timers from an earlier run are ignored
    pub generation: u64,
    pub auto_fade: Option<JoinHandle<()>>,
}

impl PlaybackState {
    pub fn new() -> Self {
        let (status, _) = watch::channel(ClipStatus::Idle);
        Self {
            status,
            voice: None,
            started_at: None,
            generation: 0,
            auto_fade: None,
        }
    }

    pub fn status(&self) -> ClipStatus {
        *self.status.borrow()
    }

    pub fn set_status(&self, status: ClipStatus) {
        self.status.send_replace(status);
    }

    pub fn cancel_auto_fade(&mut self) {
        if let Some(task) = self.auto_fade.take() {
            task.abort();
        }
    }

    /// Disconnect the voice and go idle
    pub fn release(&mut self) {
        if let Some(voice) = self.voice.take() {
            voice.stop();
        }
        self.cancel_auto_fade();
        self.started_at = None;
        self.set_status(ClipStatus::Idle);
    }
}

pub(crate) struct ClipSlot {
    pub clip: Arc<Clip>,
    pub state: PlaybackState,
}

impl ClipSlot {
    pub fn new(clip: Clip) -> Self {
        Self {
            clip: Arc::new(clip),
            state: PlaybackState::new(),
        }
    }
}

#[derive(Default)]
pub(crate) struct Session {
    /// Catalog order
    pub clips: Vec<ClipSlot>,
    pub active: Option<String>,
    /// Clip waiting for the previous one to finish fading out
    pub pending: Option<String>,
}

impl Session {
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.clips.iter().position(|slot| slot.clip.id == id)
    }

    pub fn clear_active_if(&mut self, id: &str) {
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }
    }
}
