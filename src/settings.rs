//! Audio preferences
//!
//! Stored separately from tuning: tuning shapes the run, settings shape what the
//! player hears.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which background music source to prefer at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MusicSource {
    /// Use the music file if it loads, otherwise fall back to the sequencer
    #[default]
    FileThenProcedural,
    /// Always use the procedural sequencer
    Procedural,
}

impl MusicSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MusicSource::FileThenProcedural => "file",
            MusicSource::Procedural => "procedural",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "file" | "mp3" => Some(MusicSource::FileThenProcedural),
            "procedural" | "proc" => Some(MusicSource::Procedural),
            _ => None,
        }
    }
}

/// Audio settings/preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound effects volume relative to master (0.0 - 1.0)
    pub sfx_volume: f32,
    /// Music volume relative to master (0.0 - 1.0)
    pub music_volume: f32,
    /// Mute everything
    pub muted: bool,
    /// Background music source
    pub music_source: MusicSource,
    /// Music file tried before falling back to the sequencer
    pub music_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            sfx_volume: 1.0,
            music_volume: 1.0,
            muted: false,
            music_source: MusicSource::FileThenProcedural,
            music_file: "bgm.mp3".to_string(),
        }
    }
}

impl Settings {
    /// Set master volume (clamped to 0.0 - 1.0)
    pub fn set_master_volume(&mut self, vol: f32) {
        self.master_volume = vol.clamp(0.0, 1.0);
    }

    /// Effective sound-effect gain (respects mute)
    pub fn effective_sfx_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master_volume * self.sfx_volume
        }
    }

    /// Effective music gain (respects mute)
    pub fn effective_music_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master_volume * self.music_volume
        }
    }

    /// Parse settings from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.master_volume = settings.master_volume.clamp(0.0, 1.0);
        settings.sfx_volume = settings.sfx_volume.clamp(0.0, 1.0);
        settings.music_volume = settings.music_volume.clamp(0.0, 1.0);
        Ok(settings)
    }

    /// Load settings from a JSON file, falling back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path)
            .map_err(crate::RunnerError::from)
            .and_then(|json| Self::from_json(&json))
        {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::info!("Using default settings ({e})");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mute_zeroes_effective_volumes() {
        let mut settings = Settings::default();
        assert!(settings.effective_sfx_volume() > 0.0);
        settings.muted = true;
        assert_eq!(settings.effective_sfx_volume(), 0.0);
        assert_eq!(settings.effective_music_volume(), 0.0);
    }

    #[test]
    fn test_from_json_clamps() {
        let settings = Settings::from_json(r#"{ "master_volume": 3.0, "music_source": "Procedural" }"#)
            .unwrap();
        assert_eq!(settings.master_volume, 1.0);
        assert_eq!(settings.music_source, MusicSource::Procedural);
        assert_eq!(settings.sfx_volume, 1.0);
    }

    #[test]
    fn test_master_volume_clamps() {
        let mut settings = Settings::default();
        settings.set_master_volume(0.25);
        assert_eq!(settings.effective_sfx_volume(), 0.25);
        settings.set_master_volume(4.0);
        assert_eq!(settings.master_volume, 1.0);
        settings.set_master_volume(-1.0);
        assert_eq!(settings.effective_music_volume(), 0.0);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let settings = Settings::load_or_default("/definitely/not/here.json");
        assert_eq!(settings.music_file, "bgm.mp3");
    }

    #[test]
    fn test_music_source_parse() {
        assert_eq!(MusicSource::from_str("PROC"), Some(MusicSource::Procedural));
        assert_eq!(MusicSource::from_str("file"), Some(MusicSource::FileThenProcedural));
        assert_eq!(MusicSource::from_str("vinyl"), None);
    }
}
