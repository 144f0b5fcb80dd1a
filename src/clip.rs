// Clips and their per-clip playback overrides
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::audio::AudioBuffer;

/// Scheduled fade-out that starts on its own while a clip keeps playing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoFade {
    /// Seconds after playback started
    pub at_seconds: f64,
    pub over_seconds: f64,
}

/// Static per-clip configuration, keyed by clip identifier in the settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipOverrides {
    pub display_name: Option<String>,
    /// Seconds into the buffer where playback starts
    pub start_offset: f64,
    pub play_duration: Option<f64>,
    pub fade_in: Option<f64>,
    /// 0 stops the clip without a ramp
    pub fade_out: Option<f64>,
    pub auto_fade: Option<AutoFade>,
}

impl ClipOverrides {
    pub fn fade_in_seconds(&self, default: f64) -> f64 {
        self.fade_in.unwrap_or(default).max(0.0)
    }

    pub fn fade_out_seconds(&self, default: f64) -> f64 {
        self.fade_out.unwrap_or(default).max(0.0)
    }

    pub fn stops_immediately(&self, default: f64) -> bool {
        self.fade_out_seconds(default) == 0.0
    }

    /// Every time value must be a finite, non-negative number of seconds
    /// no larger than `MAX_CLIP_SECONDS`
    pub fn validate(&self) -> Result<(), String> {
        let mut times = vec![("start_offset", Some(self.start_offset))];
        times.push(("play_duration", self.play_duration));
        times.push(("fade_in", self.fade_in));
        times.push(("fade_out", self.fade_out));
        if let Some(auto) = &self.auto_fade {
            times.push(("auto_fade.at_seconds", Some(auto.at_seconds)));
            times.push(("auto_fade.over_seconds", Some(auto.over_seconds)));
        }

        for (field, value) in times {
            if let Some(value) = value {
                check_seconds(field, value)?;
            }
        }
        Ok(())
    }
}

/// Clip identifier → overrides. Clips missing from the table use defaults.
pub type ClipTable = BTreeMap<String, ClipOverrides>;

/// The timing table for the stock sound set
pub fn builtin_clip_table() -> ClipTable {
    let entry = |name: &str| ClipOverrides {
        display_name: Some(name.to_string()),
        ..Default::default()
    };

    let mut table = ClipTable::new();
    table.insert(
        "Desert Eagle Gunshot Sound Effect.mp3".to_string(),
        ClipOverrides { start_offset: 1.0, ..entry("Waffe") },
    );
    table.insert("Die Feldlerche Vogel des Jahres 2019.mp3".to_string(), entry("Lerche"));
    table.insert(
        "Human Whistling Sound Effect 10.mp3".to_string(),
        ClipOverrides { play_duration: Some(1.4), ..entry("Pfeifen") },
    );
    table.insert(
        "Love Me Tender Elvis Presley.mp3".to_string(),
        ClipOverrides {
            auto_fade: Some(AutoFade { at_seconds: 101.0, over_seconds: 10.0 }),
            ..entry("Love Me Tender")
        },
    );
    table.insert(
        "Mendelssohn Wedding March.mp3".to_string(),
        ClipOverrides { start_offset: 3.0, fade_out: Some(5.0), ..entry("Hochzeit") },
    );
    table.insert(
        "Nightingale Songs.mp3".to_string(),
        ClipOverrides { start_offset: 6.0, ..entry("Nachtigall") },
    );
    table.insert(
        "Old Phone Ringtone.mp3".to_string(),
        ClipOverrides { fade_out: Some(0.0), ..entry("Telefon") },
    );
    table.insert(
        "Pausenmusik.mp3".to_string(),
        ClipOverrides { fade_out: Some(5.0), ..entry("Pausenmusik") },
    );
    table
}

/// Upper bound for any configured time, one day
pub const MAX_CLIP_SECONDS: f64 = 24.0 * 60.0 * 60.0;

pub fn check_seconds(field: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && (0.0..=MAX_CLIP_SECONDS).contains(&value) {
        Ok(())
    } else {
        Err(format!("{} must be between 0 and {} seconds, got {}", field, MAX_CLIP_SECONDS, value))
    }
}

/// File name without its extension
pub fn strip_extension(id: &str) -> &str {
    match id.rfind('.') {
        Some(dot) if dot > 0 => &id[..dot],
        _ => id,
    }
}

/// One loaded, playable sound
#[derive(Debug, Clone)]
pub struct Clip {
    pub id: String,
    pub display_name: String,
    pub buffer: Arc<AudioBuffer>,
    pub overrides: ClipOverrides,
}

impl Clip {
    pub fn new(id: impl Into<String>, buffer: Arc<AudioBuffer>, overrides: ClipOverrides) -> Self {
        let id = id.into();
        let display_name = overrides
            .display_name
            .clone()
            .unwrap_or_else(|| strip_extension(&id).to_string());
        Self {
            id,
            display_name,
            buffer,
            overrides,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipStatus {
    Idle,
    FadingIn,
    Playing,
    FadingOut,
}

impl ClipStatus {
    /// Audible or about to become audible
    pub fn is_live(self) -> bool {
        matches!(self, Self::FadingIn | Self::Playing)
    }
}

impl fmt::Display for ClipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::FadingIn => "fading in",
            Self::Playing => "playing",
            Self::FadingOut => "fading out",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("Nightingale Songs.mp3"), "Nightingale Songs");
        assert_eq!(strip_extension("a.b.wav"), "a.b");
        assert_eq!(strip_extension("noext"), "noext");
        assert_eq!(strip_extension(".hidden"), ".hidden");
    }

    #[test]
    fn test_display_name_fallback() {
        let buffer = Arc::new(AudioBuffer::new(vec![0.0; 4], 1000, 1));
        let plain = Clip::new("Pausenmusik.mp3", buffer.clone(), ClipOverrides::default());
        assert_eq!(plain.display_name, "Pausenmusik");

        let named = Clip::new(
            "Old Phone Ringtone.mp3",
            buffer,
            ClipOverrides { display_name: Some("Telefon".into()), ..Default::default() },
        );
        assert_eq!(named.display_name, "Telefon");
    }

    #[test]
    fn test_fade_defaults_and_overrides() {
        let plain = ClipOverrides::default();
        assert_eq!(plain.fade_in_seconds(1.5), 1.5);
        assert_eq!(plain.fade_out_seconds(1.5), 1.5);
        assert!(!plain.stops_immediately(1.5));

        let table = builtin_clip_table();
        let phone = &table["Old Phone Ringtone.mp3"];
        assert!(phone.stops_immediately(1.5));

        let wedding = &table["Mendelssohn Wedding March.mp3"];
        assert_eq!(wedding.fade_out_seconds(1.5), 5.0);
        assert_eq!(wedding.start_offset, 3.0);
    }

    #[test]
    fn test_overrides_from_partial_json() {
        let parsed: ClipOverrides =
            serde_json::from_str(r#"{"start_offset": 6.0, "auto_fade": {"at_seconds": 101, "over_seconds": 10}}"#)
                .unwrap();
        assert_eq!(parsed.start_offset, 6.0);
        assert_eq!(parsed.fade_out, None);
        assert_eq!(
            parsed.auto_fade,
            Some(AutoFade { at_seconds: 101.0, over_seconds: 10.0 })
        );
    }
}
