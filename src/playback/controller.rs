// Playback controller
// Owns the loaded clips, keeps at most one of them audible and drives
// fade transitions on the audio engine

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::state::{ClipSlot, Session};
use crate::audio::decoder::decode_clip;
use crate::audio::{AudioEngine, EngineState, StartParams, Voice};
use crate::clip::{AutoFade, Clip, ClipStatus};
use crate::error::{Result, SoundboardError};
use crate::library::catalog::ClipCatalogProvider;
use crate::settings::AppSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    /// The clip is now playing (after any previous clip faded out)
    Started,
    /// A fade-out began; the clip goes idle when it completes
    Stopping,
    /// The clip stopped without a fade
    Stopped,
    /// A transition was already pending, nothing changed
    Ignored,
}

/// Read-only view of one clip for rendering buttons
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipSnapshot {
    pub id: String,
    pub name: String,
    pub status: ClipStatus,
    /// Engine time playback began, while not idle
    pub started_at: Option<f64>,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, SoundboardError)>,
}

#[derive(Debug, Clone, Copy)]
enum FadeKind {
    /// User requested; uses the clip's fade-out time
    Manual,
    /// Scheduled by the clip itself; snaps to full gain first
    Auto { over: f64 },
}

enum Plan {
    Ignore,
    Started,
    Stop { immediate: bool },
    Switch { wait: Option<watch::Receiver<ClipStatus>> },
}

struct Shared {
    engine: Arc<dyn AudioEngine>,
    fade_seconds: f64,
    session: Mutex<Session>,
}

/// Cheap to clone; all clones drive the same session
#[derive(Clone)]
pub struct PlaybackController {
    shared: Arc<Shared>,
}

impl PlaybackController {
    pub fn new(engine: Arc<dyn AudioEngine>, fade_seconds: f64) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine,
                fade_seconds: fade_seconds.max(0.0),
                session: Mutex::new(Session::default()),
            }),
        }
    }

    pub fn engine(&self) -> &Arc<dyn AudioEngine> {
        &self.shared.engine
    }

    pub fn fade_seconds(&self) -> f64 {
        self.shared.fade_seconds
    }

    /// List, fetch and decode every clip the provider offers.
    /// Clips that fail to fetch or decode are left out; a listing failure
    /// loads nothing and is returned as an error.
    pub async fn load(&self, provider: &dyn ClipCatalogProvider, settings: &AppSettings) -> Result<LoadReport> {
        tracing::debug!("Fetching clip list from {}", provider.describe());
        let ids = provider.list_clips().await?;
        let target_rate = self.shared.engine.sample_rate();

        let results = join_all(
            ids.iter()
                .map(|id| load_clip(provider, id, settings, target_rate)),
        )
        .await;

        let mut report = LoadReport::default();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(clip) => {
                    self.insert_clip(clip);
                    report.loaded.push(id);
                }
                Err(e) => {
                    tracing::warn!("Failed to load {}: {}", id, e);
                    report.failed.push((id, e));
                }
            }
        }

        tracing::info!(
            "Preload complete: {}/{} sounds loaded successfully",
            report.loaded.len(),
            report.loaded.len() + report.failed.len()
        );
        Ok(report)
    }

    /// Add a clip, replacing (and silencing) one with the same id
    pub fn insert_clip(&self, clip: Clip) {
        let mut session = self.shared.session.lock();
        let id = clip.id.clone();
        match session.index_of(&id) {
            Some(idx) => {
                session.clips[idx].state.release();
                session.clips[idx] = ClipSlot::new(clip);
                session.clear_active_if(&id);
                if session.pending.as_deref() == Some(id.as_str()) {
                    session.pending = None;
                }
            }
            None => session.clips.push(ClipSlot::new(clip)),
        }
    }

    /// Toggle a clip: stop it if it's the one playing, otherwise fade out
    /// whatever is active and start it
    pub async fn toggle(&self, id: &str) -> Result<ToggleOutcome> {
        self.run(id, true).await
    }

    /// Start a clip (fading out the active one first). Never stops `id`.
    pub async fn fade_in(&self, id: &str) -> Result<ToggleOutcome> {
        self.run(id, false).await
    }

    /// Fade a clip out and wait until it is idle.
    /// Resolves immediately if the clip isn't playing.
    pub async fn fade_out(&self, id: &str) -> Result<()> {
        let wait = {
            let mut session = self.shared.session.lock();
            let idx = session
                .index_of(id)
                .ok_or_else(|| SoundboardError::UnknownClip(id.to_string()))?;
            self.begin_fade_out_locked(&mut session, idx, FadeKind::Manual)
        };
        wait_idle(wait).await;
        Ok(())
    }

    /// Fade out anything audible and wait for silence
    pub async fn stop_all(&self) {
        let waits: Vec<_> = {
            let mut session = self.shared.session.lock();
            session.pending = None;
            let mut waits = Vec::new();
            for idx in 0..session.clips.len() {
                match session.clips[idx].state.status() {
                    ClipStatus::Idle => {}
                    // Waiting for a switch; nothing is connected yet
                    ClipStatus::FadingIn if session.clips[idx].state.voice.is_none() => {
                        let id = session.clips[idx].clip.id.clone();
                        session.clips[idx].state.release();
                        session.clear_active_if(&id);
                    }
                    _ => waits.push(self.begin_fade_out_locked(&mut session, idx, FadeKind::Manual)),
                }
            }
            waits
        };

        for wait in waits {
            wait_idle(wait).await;
        }
    }

    pub fn clip_ids(&self) -> Vec<String> {
        self.shared.session.lock().clips.iter().map(|s| s.clip.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.shared.session.lock().clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clip(&self, id: &str) -> Option<Arc<Clip>> {
        let session = self.shared.session.lock();
        session.index_of(id).map(|idx| session.clips[idx].clip.clone())
    }

    pub fn status(&self, id: &str) -> Option<ClipStatus> {
        let session = self.shared.session.lock();
        session.index_of(id).map(|idx| session.clips[idx].state.status())
    }

    /// The clip currently audible or about to become audible
    pub fn active(&self) -> Option<String> {
        self.shared.session.lock().active.clone()
    }

    /// Live voice of a clip, if it is connected to the output
    pub fn voice(&self, id: &str) -> Option<Voice> {
        let session = self.shared.session.lock();
        session.index_of(id).and_then(|idx| session.clips[idx].state.voice.clone())
    }

    /// Status updates for one clip
    pub fn subscribe(&self, id: &str) -> Option<watch::Receiver<ClipStatus>> {
        let session = self.shared.session.lock();
        session.index_of(id).map(|idx| session.clips[idx].state.status.subscribe())
    }

    pub fn snapshot(&self) -> Vec<ClipSnapshot> {
        let session = self.shared.session.lock();
        session
            .clips
            .iter()
            .map(|slot| ClipSnapshot {
                id: slot.clip.id.clone(),
                name: slot.clip.display_name.clone(),
                status: slot.state.status(),
                started_at: slot.state.started_at,
            })
            .collect()
    }

    async fn run(&self, id: &str, allow_stop: bool) -> Result<ToggleOutcome> {
        if self.status(id).is_none() {
            tracing::warn!("Sound not found: {}", id);
            return Err(SoundboardError::UnknownClip(id.to_string()));
        }

        self.ensure_running().await?;

        match self.plan(id, allow_stop)? {
            Plan::Ignore => Ok(ToggleOutcome::Ignored),
            Plan::Started => Ok(ToggleOutcome::Started),
            Plan::Stop { immediate: true } => Ok(ToggleOutcome::Stopped),
            Plan::Stop { immediate: false } => Ok(ToggleOutcome::Stopping),
            Plan::Switch { wait } => {
                // Finish the switch on its own task so a dropped caller
                // can't leave the board stuck waiting
                let this = self.clone();
                let id = id.to_string();
                let switch = tokio::spawn(async move {
                    wait_idle(wait).await;
                    this.finish_switch(&id)
                });
                switch.await.unwrap_or_else(|e| {
                    tracing::error!("Switch task failed: {}", e);
                    Ok(ToggleOutcome::Ignored)
                })
            }
        }
    }

    async fn ensure_running(&self) -> Result<()> {
        if self.shared.engine.state() != EngineState::Suspended {
            return Ok(());
        }

        tracing::debug!("Audio engine suspended, attempting to resume...");
        // Resuming a device engine waits on its audio thread
        let engine = self.shared.engine.clone();
        tokio::task::spawn_blocking(move || engine.resume())
            .await
            .map_err(|e| SoundboardError::EngineInit(format!("resume task failed: {}", e)))??;
        tracing::debug!("Audio engine state: {:?}", self.shared.engine.state());
        Ok(())
    }

    /// Decide and schedule a toggle under one lock, so concurrent toggles
    /// can never start two clips
    fn plan(&self, id: &str, allow_stop: bool) -> Result<Plan> {
        let mut session = self.shared.session.lock();

        if let Some(pending) = &session.pending {
            tracing::debug!("Ignoring toggle of {} while {} waits to start", id, pending);
            return Ok(Plan::Ignore);
        }

        let idx = session
            .index_of(id)
            .ok_or_else(|| SoundboardError::UnknownClip(id.to_string()))?;

        match session.clips[idx].state.status() {
            ClipStatus::FadingIn | ClipStatus::FadingOut => {
                tracing::debug!("Ignoring toggle of {} during a transition", id);
                Ok(Plan::Ignore)
            }
            ClipStatus::Playing if !allow_stop => Ok(Plan::Ignore),
            ClipStatus::Playing => {
                tracing::debug!("Stopping: {}", id);
                let wait = self.begin_fade_out_locked(&mut session, idx, FadeKind::Manual);
                Ok(Plan::Stop { immediate: wait.is_none() })
            }
            ClipStatus::Idle => {
                let current = session.active.clone().filter(|a| a != id);
                let Some(current) = current else {
                    tracing::debug!("Starting: {}", id);
                    self.start_locked(&mut session, idx)?;
                    return Ok(Plan::Started);
                };

                tracing::debug!("Stopping current sound {} before starting {}", current, id);
                let wait = match session.index_of(&current) {
                    Some(current_idx) => self.begin_fade_out_locked(&mut session, current_idx, FadeKind::Manual),
                    None => None,
                };
                session.clear_active_if(&current);

                if wait.is_none() {
                    // Stopped without a fade; nothing to wait for
                    self.start_locked(&mut session, idx)?;
                    return Ok(Plan::Started);
                }

                // Handlers still holding the previous run's generation must not
                // touch the pending clip
                let pending = &mut session.clips[idx].state;
                pending.generation += 1;
                pending.set_status(ClipStatus::FadingIn);
                session.active = Some(id.to_string());
                session.pending = Some(id.to_string());
                Ok(Plan::Switch { wait })
            }
        }
    }

    fn finish_switch(&self, id: &str) -> Result<ToggleOutcome> {
        let mut session = self.shared.session.lock();
        if session.pending.as_deref() != Some(id) {
            // Cancelled by stop_all or a reload
            return Ok(ToggleOutcome::Ignored);
        }
        session.pending = None;

        let Some(idx) = session.index_of(id) else {
            return Ok(ToggleOutcome::Ignored);
        };
        if session.clips[idx].state.status() != ClipStatus::FadingIn {
            return Ok(ToggleOutcome::Ignored);
        }

        tracing::debug!("Starting: {}", id);
        self.start_locked(&mut session, idx)?;
        Ok(ToggleOutcome::Started)
    }

    /// Connect a fresh voice, fade it in and make the clip active
    fn start_locked(&self, session: &mut Session, idx: usize) -> Result<()> {
        let engine = self.shared.engine.clone();
        let slot = &mut session.clips[idx];
        let clip = slot.clip.clone();
        let fade_in = clip.overrides.fade_in_seconds(self.shared.fade_seconds);
        let fade_in = if fade_duration(fade_in).is_some() { fade_in } else { 0.0 };

        slot.state.set_status(ClipStatus::FadingIn);
        let params = StartParams {
            offset: clip.overrides.start_offset,
            duration: clip.overrides.play_duration,
            initial_gain: if fade_in > 0.0 { 0.0 } else { 1.0 },
        };

        let voice = match engine.start_voice(clip.buffer.clone(), params) {
            Ok(voice) => voice,
            Err(e) => {
                tracing::error!("Error starting sound {}: {}", clip.id, e);
                slot.state.release();
                session.clear_active_if(&clip.id);
                return Err(e);
            }
        };

        let now = engine.current_time();
        if fade_in > 0.0 {
            voice.ramp_gain(1.0, now, now + fade_in);
        }

        slot.state.generation += 1;
        let generation = slot.state.generation;
        slot.state.voice = Some(voice.clone());
        slot.state.started_at = Some(now);
        slot.state.set_status(ClipStatus::Playing);

        if let Some(auto) = clip.overrides.auto_fade {
            slot.state.auto_fade = self.spawn_auto_fade(clip.id.clone(), generation, auto);
        }
        session.active = Some(clip.id.clone());

        self.watch_natural_end(clip.id.clone(), generation, &voice);

        tracing::debug!(
            "Started fade in: {}, offset: {}s, duration: {}s",
            clip.id,
            clip.overrides.start_offset,
            fade_in
        );
        Ok(())
    }

    /// Start fading a clip out. Returns a receiver to wait on when the
    /// fade completes later, or None when the clip is already idle (or
    /// was stopped on the spot).
    fn begin_fade_out_locked(
        &self,
        session: &mut Session,
        idx: usize,
        kind: FadeKind,
    ) -> Option<watch::Receiver<ClipStatus>> {
        let slot = &mut session.clips[idx];
        let id = slot.clip.id.clone();
        let status = slot.state.status();

        let voice = match (&slot.state.voice, status) {
            (_, ClipStatus::Idle) | (None, _) => {
                tracing::debug!("Cannot fade out {} - not playing", id);
                return None;
            }
            (Some(_), ClipStatus::FadingOut) => return Some(slot.state.status.subscribe()),
            (Some(voice), _) => voice.clone(),
        };

        slot.state.cancel_auto_fade();

        let duration = match kind {
            FadeKind::Manual => slot.clip.overrides.fade_out_seconds(self.shared.fade_seconds),
            FadeKind::Auto { over } => over.max(0.0),
        };

        if fade_duration(duration).is_none() {
            tracing::debug!("Stopping {} immediately without fade", id);
            slot.state.release();
            session.clear_active_if(&id);
            return None;
        }

        let now = self.shared.engine.current_time();
        match kind {
            // Drop whatever ramp is in flight and fade from full volume
            FadeKind::Auto { .. } => voice.set_gain(1.0, now),
            FadeKind::Manual => {
                voice.cancel_and_hold(now);
            }
        }
        voice.ramp_gain(0.0, now, now + duration);

        slot.state.set_status(ClipStatus::FadingOut);
        let generation = slot.state.generation;
        let wait = slot.state.status.subscribe();
        session.clear_active_if(&id);

        tracing::debug!("Started fade out: {}, duration: {}s", id, duration);
        self.spawn_fade_completion(id, generation, duration);
        Some(wait)
    }

    fn spawn_fade_completion(&self, id: String, generation: u64, duration: f64) {
        let this = self.clone();
        let delay = fade_duration(duration).unwrap_or(Duration::ZERO);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.finish_fade_out(&id, generation);
        });
    }

    fn finish_fade_out(&self, id: &str, generation: u64) {
        let mut session = self.shared.session.lock();
        let Some(idx) = session.index_of(id) else { return };
        let state = &mut session.clips[idx].state;
        if state.generation != generation || state.status() != ClipStatus::FadingOut {
            return;
        }
        state.release();
        session.clear_active_if(id);
        tracing::debug!("Stopped and disconnected: {}", id);
    }

    fn spawn_auto_fade(&self, id: String, generation: u64, auto: AutoFade) -> Option<JoinHandle<()>> {
        let Ok(delay) = Duration::try_from_secs_f64(auto.at_seconds.max(0.0)) else {
            tracing::warn!("Ignoring automatic fade for {} at {}s", id, auto.at_seconds);
            return None;
        };
        let this = self.clone();
        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.fire_auto_fade(&id, generation, auto.over_seconds);
        }))
    }

    fn fire_auto_fade(&self, id: &str, generation: u64, over: f64) {
        let mut session = self.shared.session.lock();
        let Some(idx) = session.index_of(id) else { return };
        let is_active = session.active.as_deref() == Some(id);

        let state = &mut session.clips[idx].state;
        if state.generation != generation || state.status() != ClipStatus::Playing || !is_active {
            tracing::debug!("Skipping stale automatic fade for {}", id);
            return;
        }
        // This task is the one running; detach instead of aborting it
        state.auto_fade.take();

        tracing::info!("Starting automatic {}s fade out for {}", over, id);
        self.begin_fade_out_locked(&mut session, idx, FadeKind::Auto { over });
    }

    fn watch_natural_end(&self, id: String, generation: u64, voice: &Voice) {
        let this = self.clone();
        let ended = voice.ended();
        tokio::spawn(async move {
            ended.await;
            this.on_voice_ended(&id, generation);
        });
    }

    fn on_voice_ended(&self, id: &str, generation: u64) {
        let mut session = self.shared.session.lock();
        let Some(idx) = session.index_of(id) else { return };
        let state = &mut session.clips[idx].state;
        if state.generation != generation || state.status() == ClipStatus::Idle || state.voice.is_none() {
            return;
        }
        tracing::debug!("Sound ended naturally: {}", id);
        state.release();
        session.clear_active_if(id);
    }
}

/// Fade length as a timer duration; None when the clip should stop on the
/// spot (zero, or too long to schedule)
fn fade_duration(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds)
        .ok()
        .filter(|d| !d.is_zero())
}

async fn wait_idle(wait: Option<watch::Receiver<ClipStatus>>) {
    if let Some(mut rx) = wait {
        let _ = rx.wait_for(|status| *status == ClipStatus::Idle).await;
    }
}

async fn load_clip(
    provider: &dyn ClipCatalogProvider,
    id: &str,
    settings: &AppSettings,
    target_rate: u32,
) -> Result<Clip> {
    tracing::debug!("Loading: {}", id);
    let bytes = provider.fetch_clip(id).await?;
    tracing::debug!("Downloaded {} ({} bytes)", id, bytes.len());

    let extension = Path::new(id)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_string);
    let decode_error = |reason: String| SoundboardError::Decode { id: id.to_string(), reason };

    let buffer = tokio::task::spawn_blocking(move || decode_clip(bytes, extension.as_deref(), target_rate))
        .await
        .map_err(|e| decode_error(e.to_string()))?
        .map_err(decode_error)?;

    tracing::debug!(
        "Decoded {} - Duration: {:.2}s, Sample rate: {}Hz",
        id,
        buffer.duration().as_secs_f64(),
        buffer.sample_rate()
    );
    Ok(Clip::new(id, Arc::new(buffer), settings.overrides_for(id)))
}
