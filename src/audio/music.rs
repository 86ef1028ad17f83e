//! Background music
//!
//! Either a streamed file whose rate and volume follow the run's speed, or the
//! procedural measure sequencer. The choice is made once at startup; if the file
//! can't be opened the procedural sequencer takes over.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::sequencer::Sequencer;
use super::sheet::MusicSheet;
use super::{AudioEngine, Synth};
use crate::error::{Result, RunnerError};
use crate::settings::{MusicSource, Settings};
use crate::sim::state::SpeedSnapshot;

/// Playback rate for a streamed track: +1% per +10% speed, kept within [0.95, 1.15]
pub fn streamed_playback_rate(speed_ratio: f32) -> f32 {
    (1.0 + (speed_ratio - 1.0) * 0.1).clamp(0.95, 1.15)
}

/// Volume for a streamed track, within [0.55, 0.7]
pub fn streamed_volume(speed_ratio: f32) -> f32 {
    (0.6 + (speed_ratio - 1.0) * 0.05).clamp(0.55, 0.7)
}

/// A looping music file handed to the host's media player
#[derive(Debug, Clone)]
pub struct StreamedTrack {
    path: PathBuf,
    playing: bool,
    playback_rate: f32,
    volume: f32,
}

impl StreamedTrack {
    /// Check the file is there and readable
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(source) => return Err(RunnerError::AssetLoadFailure { path, source }),
        };
        if !meta.is_file() {
            return Err(RunnerError::AssetLoadFailure {
                path,
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }
        log::info!("Loaded music file {}", path.display());
        Ok(Self {
            path,
            playing: false,
            playback_rate: 1.0,
            volume: streamed_volume(1.0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn playback_rate(&self) -> f32 {
        self.playback_rate
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Track the speed ratio; `gain` is the music volume after settings
    pub fn follow_speed(&mut self, speed_ratio: f32, gain: f32) {
        let ratio = if speed_ratio.is_finite() { speed_ratio } else { 1.0 };
        self.playback_rate = streamed_playback_rate(ratio);
        self.volume = streamed_volume(ratio) * gain;
    }
}

/// The measure sequencer as background music
#[derive(Debug, Clone)]
pub struct ProceduralMusic {
    sequencer: Sequencer,
}

impl ProceduralMusic {
    pub fn new(sheet: MusicSheet, base_tempo: f32) -> Self {
        Self {
            sequencer: Sequencer::new(sheet, base_tempo),
        }
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Fire the sequencer if its next measure is due
    pub fn poll<S: Synth>(&mut self, now: f64, speed_ratio: f32, engine: &mut AudioEngine<S>) -> bool {
        match self.sequencer.pending() {
            Some(pending) if pending.at <= now => self
                .sequencer
                .fire(pending.token, now, speed_ratio, engine)
                .is_some(),
            _ => false,
        }
    }
}

/// Background music, streamed or procedural
#[derive(Debug, Clone)]
pub enum BackgroundMusic {
    Streamed(StreamedTrack),
    Procedural(ProceduralMusic),
}

impl BackgroundMusic {
    /// Pick the music source once at startup
    pub fn select(settings: &Settings, sheet: MusicSheet, base_tempo: f32) -> Self {
        if settings.music_source == MusicSource::FileThenProcedural {
            match StreamedTrack::open(&settings.music_file) {
                Ok(track) => return BackgroundMusic::Streamed(track),
                Err(e) => log::warn!("{e}; using procedural music"),
            }
        }
        BackgroundMusic::Procedural(ProceduralMusic::new(sheet, base_tempo))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BackgroundMusic::Streamed(_) => "streamed",
            BackgroundMusic::Procedural(_) => "procedural",
        }
    }

    /// Start (or resume) playback. Playing twice never doubles the loop.
    pub fn play(&mut self, now: f64) {
        match self {
            BackgroundMusic::Streamed(track) => track.playing = true,
            BackgroundMusic::Procedural(music) => {
                music.sequencer.start(now);
            }
        }
    }

    /// Stop playback; the procedural loop's pending measure is cancelled
    pub fn pause(&mut self) {
        match self {
            BackgroundMusic::Streamed(track) => track.playing = false,
            BackgroundMusic::Procedural(music) => {
                music.sequencer.stop();
            }
        }
    }

    /// Music on/off switch, independent of mute. Returns true if now playing.
    pub fn toggle(&mut self, now: f64) -> bool {
        if self.is_paused() {
            self.play(now);
        } else {
            self.pause();
        }
        !self.is_paused()
    }

    pub fn is_paused(&self) -> bool {
        match self {
            BackgroundMusic::Streamed(track) => !track.playing,
            BackgroundMusic::Procedural(music) => !music.sequencer.is_running(),
        }
    }

    /// Follow the latest speed snapshot; fires the sequencer when a measure is due
    pub fn update<S: Synth>(&mut self, now: f64, snapshot: SpeedSnapshot, engine: &mut AudioEngine<S>) {
        match self {
            BackgroundMusic::Streamed(track) => {
                track.follow_speed(snapshot.speed_ratio, engine.settings().effective_music_volume())
            }
            BackgroundMusic::Procedural(music) => {
                music.poll(now, snapshot.speed_ratio, engine);
            }
        }
    }
}
