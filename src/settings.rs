// Settings management
// Fade timing and the per-clip table, loaded from a JSON file
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::clip::{builtin_clip_table, check_seconds, ClipOverrides, ClipTable};
use crate::error::{Result, SoundboardError};

pub const DEFAULT_FADE_SECONDS: f64 = 1.5;

/// Playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Fade used when a clip has no override of its own
    pub fade_seconds: f64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            fade_seconds: DEFAULT_FADE_SECONDS,
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub version: i32, // Settings schema version for future migrations
    pub playback: PlaybackSettings,
    pub clips: ClipTable,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: 1,
            playback: PlaybackSettings::default(),
            clips: builtin_clip_table(),
        }
    }
}

impl AppSettings {
    /// Load settings from file, or return defaults if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SoundboardError::Settings(format!("Failed to read {:?}: {}", path, e)))?;

        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| SoundboardError::Settings(format!("Failed to parse {:?}: {}", path, e)))?;

        settings.validate()?;

        tracing::info!("Loaded settings from {:?} ({} clip overrides)", path, settings.clips.len());
        Ok(settings)
    }

    /// Reject times the player can't schedule
    pub fn validate(&self) -> Result<()> {
        check_seconds("playback.fade_seconds", self.playback.fade_seconds).map_err(SoundboardError::Settings)?;
        for (id, overrides) in &self.clips {
            overrides
                .validate()
                .map_err(|e| SoundboardError::Settings(format!("clip {:?}: {}", id, e)))?;
        }
        Ok(())
    }

    /// Save settings to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SoundboardError::Settings(format!("Failed to serialize settings: {}", e)))?;
        fs::write(path, content)?;

        tracing::debug!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Overrides for a clip; unknown clips get the defaults
    pub fn overrides_for(&self, id: &str) -> ClipOverrides {
        self.clips.get(id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings::load(&dir.path().join("soundboard.json")).unwrap();
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.playback.fade_seconds, 1.5);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("soundboard.json");

        let mut settings = AppSettings::default();
        settings.playback.fade_seconds = 2.0;
        settings.clips.insert(
            "Bell.wav".to_string(),
            ClipOverrides { fade_out: Some(0.5), ..Default::default() },
        );
        settings.save(&path).unwrap();

        let loaded = AppSettings::load(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.overrides_for("Bell.wav").fade_out, Some(0.5));
        assert_eq!(loaded.overrides_for("Unknown.wav"), ClipOverrides::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soundboard.json");
        fs::write(&path, r#"{"playback": {"fade_seconds": 3.0}}"#).unwrap();

        let settings = AppSettings::load(&path).unwrap();
        assert_eq!(settings.playback.fade_seconds, 3.0);
        assert_eq!(settings.clips, builtin_clip_table());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soundboard.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(AppSettings::load(&path), Err(SoundboardError::Settings(_))));
    }

    #[test]
    fn test_negative_fade_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soundboard.json");
        fs::write(&path, r#"{"playback": {"fade_seconds": -1}}"#).unwrap();

        assert!(AppSettings::load(&path).is_err());
    }

    #[test]
    fn test_unschedulable_clip_times_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soundboard.json");

        for clip in [
            r#"{"fade_out": 1e20}"#,
            r#"{"fade_in": -2}"#,
            r#"{"auto_fade": {"at_seconds": 1e300, "over_seconds": 1}}"#,
            r#"{"auto_fade": {"at_seconds": 10, "over_seconds": 1e20}}"#,
        ] {
            fs::write(&path, format!(r#"{{"clips": {{"Bell.wav": {}}}}}"#, clip)).unwrap();
            let err = AppSettings::load(&path).unwrap_err();
            assert!(matches!(err, SoundboardError::Settings(_)), "{}", clip);
            assert!(err.to_string().contains("Bell.wav"), "{}", err);
        }

        fs::write(&path, r#"{"playback": {"fade_seconds": 1e20}}"#).unwrap();
        assert!(matches!(AppSettings::load(&path), Err(SoundboardError::Settings(_))));
    }

    #[test]
    fn test_builtin_table_is_valid() {
        assert!(AppSettings::default().validate().is_ok());
    }
}
