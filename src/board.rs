// Soundboard session
// Initialization flow, the status line and the button list
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::audio::AudioEngine;
use crate::error::{Result, SoundboardError};
use crate::library::catalog::ClipCatalogProvider;
use crate::playback::{ClipSnapshot, PlaybackController, ToggleOutcome};
use crate::settings::AppSettings;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum BoardStatus {
    Initializing,
    Ready,
    /// Display name of the active clip
    Playing(String),
    Error(String),
}

impl fmt::Display for BoardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => f.write_str("Initializing..."),
            Self::Ready => f.write_str("Ready"),
            Self::Playing(name) => write!(f, "Playing: {}", name),
            Self::Error(_) => f.write_str("Error"),
        }
    }
}

enum Phase {
    Initializing,
    Loaded(PlaybackController),
    Failed(String),
}

/// Shared handle to one soundboard session
#[derive(Clone)]
pub struct Soundboard {
    phase: Arc<RwLock<Phase>>,
}

impl Default for Soundboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Soundboard {
    pub fn new() -> Self {
        Self {
            phase: Arc::new(RwLock::new(Phase::Initializing)),
        }
    }

    /// Bring up the session: any engine or listing error leaves the board
    /// in the error state with no buttons. Individual clips that fail to
    /// load are skipped.
    pub async fn initialize(
        &self,
        engine: Result<Arc<dyn AudioEngine>>,
        provider: &dyn ClipCatalogProvider,
        settings: &AppSettings,
    ) {
        *self.phase.write() = Phase::Initializing;

        let engine = match engine {
            Ok(engine) => engine,
            Err(e) => return self.fail(e),
        };
        tracing::info!(
            "Audio engine {} ready at {}Hz, {} channels",
            engine.name(),
            engine.sample_rate(),
            engine.channels()
        );

        let controller = PlaybackController::new(engine, settings.playback.fade_seconds);
        match controller.load(provider, settings).await {
            Ok(report) => {
                tracing::info!("Soundboard ready with {} buttons", report.loaded.len());
                *self.phase.write() = Phase::Loaded(controller);
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&self, error: SoundboardError) {
        tracing::error!("Failed to initialize soundboard: {}", error);
        *self.phase.write() = Phase::Failed(error.to_string());
    }

    pub fn status(&self) -> BoardStatus {
        match &*self.phase.read() {
            Phase::Initializing => BoardStatus::Initializing,
            Phase::Failed(message) => BoardStatus::Error(message.clone()),
            Phase::Loaded(controller) => match controller.active() {
                Some(id) => {
                    let name = controller
                        .clip(&id)
                        .map(|clip| clip.display_name.clone())
                        .unwrap_or(id);
                    BoardStatus::Playing(name)
                }
                None => BoardStatus::Ready,
            },
        }
    }

    /// One entry per loaded clip, in catalog order
    pub fn buttons(&self) -> Vec<ClipSnapshot> {
        self.controller().map(|c| c.snapshot()).unwrap_or_default()
    }

    pub fn controller(&self) -> Option<PlaybackController> {
        match &*self.phase.read() {
            Phase::Loaded(controller) => Some(controller.clone()),
            _ => None,
        }
    }

    /// A button press
    pub async fn press(&self, id: &str) -> Result<ToggleOutcome> {
        let controller = self.controller().ok_or_else(|| {
            SoundboardError::EngineInit(format!("soundboard not ready ({})", self.status()))
        })?;
        controller.toggle(id).await
    }

    /// Silence everything before shutdown
    pub async fn shutdown(&self) {
        if let Some(controller) = self.controller() {
            controller.stop_all().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decoder::tests::wav_bytes;
    use crate::audio::HeadlessEngine;
    use crate::library::catalog::testing::MemoryCatalog;

    fn headless() -> Result<Arc<dyn AudioEngine>> {
        Ok(Arc::new(HeadlessEngine::new(8000, 1)))
    }

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new(vec![
            ("Old Phone Ringtone.mp3", Some(wav_bytes(8000, 1, 8000, 1000))),
            ("Nightingale Songs.mp3", Some(wav_bytes(8000, 1, 80000, 1000))),
            ("broken.wav", None),
        ])
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(BoardStatus::Initializing.to_string(), "Initializing...");
        assert_eq!(BoardStatus::Playing("Telefon".into()).to_string(), "Playing: Telefon");
        assert_eq!(BoardStatus::Error("no device".into()).to_string(), "Error");
        assert_eq!(
            serde_json::to_value(BoardStatus::Error("no device".into())).unwrap(),
            serde_json::json!({"state": "error", "detail": "no device"})
        );
    }

    #[tokio::test]
    async fn test_initialize_ready() {
        let board = Soundboard::new();
        assert_eq!(board.status(), BoardStatus::Initializing);

        board.initialize(headless(), &catalog(), &AppSettings::default()).await;

        assert_eq!(board.status(), BoardStatus::Ready);
        let names: Vec<_> = board.buttons().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["Telefon", "Nachtigall"]);
    }

    #[tokio::test]
    async fn test_listing_failure_shows_error() {
        let board = Soundboard::new();

        board
            .initialize(headless(), &MemoryCatalog::failing(), &AppSettings::default())
            .await;

        assert!(matches!(board.status(), BoardStatus::Error(_)));
        assert!(board.buttons().is_empty());
        assert!(board.controller().is_none());
    }

    #[tokio::test]
    async fn test_engine_failure_shows_error() {
        let board = Soundboard::new();

        board
            .initialize(
                Err(SoundboardError::EngineInit("no output device".into())),
                &catalog(),
                &AppSettings::default(),
            )
            .await;

        assert_eq!(
            board.status(),
            BoardStatus::Error("audio engine unavailable: no output device".into())
        );
        assert!(board.buttons().is_empty());
        assert!(board.press("Old Phone Ringtone.mp3").await.is_err());
    }

    #[tokio::test]
    async fn test_press_reports_playing_name() {
        let board = Soundboard::new();
        board.initialize(headless(), &catalog(), &AppSettings::default()).await;

        let outcome = board.press("Old Phone Ringtone.mp3").await.unwrap();

        assert_eq!(outcome, ToggleOutcome::Started);
        assert_eq!(board.status(), BoardStatus::Playing("Telefon".into()));

        // The phone stops without a fade, so the switch is immediate
        assert_eq!(board.press("Nightingale Songs.mp3").await.unwrap(), ToggleOutcome::Started);
        assert_eq!(board.status(), BoardStatus::Playing("Nachtigall".into()));
    }
}
