//! Measure sequencer
//!
//! A self-rescheduling measure player with its own clock. Each firing reads the
//! speed ratio, picks the song for that band, renders one measure into tones and
//! returns when it wants to fire next. Every schedule carries a token; stopping or
//! restarting invalidates outstanding tokens so a late firing is ignored instead of
//! starting a second loop.

use serde::{Deserialize, Serialize};

use super::sheet::{Measure, MusicSheet, Song, frequency_or_fallback};
use super::{AudioEngine, Envelope, Synth, ToneRequest, Waveform};

/// Tempo stops scaling past this speed ratio
pub const MAX_TEMPO_SCALE: f32 = 2.0;
/// Overall music gain before volume settings
const MUSIC_GAIN: f32 = 0.15;
const NOTE_ATTACK: f64 = 0.05;
/// Notes reach the floor this long before they end
const NOTE_RELEASE: f64 = 0.05;
const NOTE_FLOOR: f32 = 0.001;
/// Stagger between chord voices (seconds)
const ARPEGGIO_STEP: f64 = 0.03;
const DRUM_ATTACK: f64 = 0.01;

/// Speed ratio with garbage mapped to 1.0
fn sane_ratio(ratio: f32) -> f32 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    }
}

/// Tempo (BPM) for a base tempo and speed ratio; speed scaling is capped at 2x
pub fn tempo(base_tempo: f32, speed_ratio: f32) -> f32 {
    base_tempo * sane_ratio(speed_ratio).min(MAX_TEMPO_SCALE)
}

/// Seconds per beat
pub fn beat_duration(tempo: f32) -> f64 {
    60.0 / tempo.max(1.0) as f64
}

/// Render one measure starting at `start` into tones.
///
/// Melody notes are sine, chord voices are triangle and staggered by 30 ms; above
/// 1.2x speed a kick/snare/hi-hat pattern is layered on top. `gain` is the music
/// volume after settings.
pub fn render_measure(
    measure: &Measure,
    start: f64,
    beat_duration: f64,
    speed_ratio: f32,
    beats_per_measure: u32,
    gain: f32,
) -> Vec<ToneRequest> {
    let ratio = sane_ratio(speed_ratio);
    let loudness = 0.8 + ratio * 0.4;
    let mut tones = Vec::new();

    let melody_peak = loudness * 1.2 * gain * MUSIC_GAIN;
    for note in &measure.notes {
        let duration = note.duration as f64 * beat_duration;
        tones.push(ToneRequest {
            frequency: frequency_or_fallback(&note.pitch),
            waveform: Waveform::Sine,
            start: start + (note.beat as f64 - 1.0) * beat_duration,
            duration,
            envelope: Envelope::new(melody_peak, NOTE_ATTACK, duration - NOTE_RELEASE, NOTE_FLOOR),
        });
    }

    let harmony_peak = loudness * 0.6 * gain * MUSIC_GAIN;
    for chord in &measure.harmony {
        let chord_start = start + (chord.beat as f64 - 1.0) * beat_duration;
        let chord_duration = chord.duration as f64 * beat_duration;
        for (i, pitch) in chord.pitches.iter().enumerate() {
            let delay = i as f64 * ARPEGGIO_STEP;
            let duration = (chord_duration - delay).max(0.0);
            tones.push(ToneRequest {
                frequency: frequency_or_fallback(pitch),
                waveform: Waveform::Triangle,
                start: chord_start + delay,
                duration,
                envelope: Envelope::new(harmony_peak, NOTE_ATTACK, duration - NOTE_RELEASE, NOTE_FLOOR),
            });
        }
    }

    if ratio > 1.2 {
        for beat in 1..=beats_per_measure {
            let at = start + (beat - 1) as f64 * beat_duration;
            if beat == 1 || beat == 3 {
                tones.push(drum_hit(at, 60.0, 0.1, 0.04 * ratio * gain));
            }
            if ratio > 1.5 && (beat == 2 || beat == 4) {
                tones.push(drum_hit(at, 200.0, 0.08, 0.03 * ratio * gain));
            }
            if ratio > 1.8 {
                tones.push(drum_hit(at + beat_duration * 0.5, 8000.0, 0.03, 0.02 * ratio * gain));
            }
        }
    }

    tones
}

/// Short percussive tone: square below 100 Hz, sawtooth above
fn drum_hit(start: f64, frequency: f32, duration: f64, volume: f32) -> ToneRequest {
    ToneRequest {
        frequency,
        waveform: if frequency < 100.0 {
            Waveform::Square
        } else {
            Waveform::Sawtooth
        },
        start,
        duration,
        envelope: Envelope::new(volume, DRUM_ATTACK, duration, NOTE_FLOOR),
    }
}

/// A pending firing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reschedule {
    pub token: u64,
    /// Wall-clock second the firing is due
    pub at: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SequencerState {
    Idle,
    /// Waiting for the firing with this token
    Scheduled { token: u64, at: f64 },
    /// Inside a firing
    Playing { token: u64 },
}

/// Where playback is
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaybackCursor {
    pub song: Option<Song>,
    pub measure: usize,
    pub next_fire: f64,
}

/// The measure player
#[derive(Debug, Clone)]
pub struct Sequencer {
    sheet: MusicSheet,
    /// Tempo for compositions that don't carry one
    base_tempo: f32,
    state: SequencerState,
    cursor: PlaybackCursor,
    /// Bumped on every schedule and every stop; only the latest token may fire
    generation: u64,
}

impl Sequencer {
    pub fn new(sheet: MusicSheet, base_tempo: f32) -> Self {
        Self {
            sheet,
            base_tempo,
            state: SequencerState::Idle,
            cursor: PlaybackCursor::default(),
            generation: 0,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn cursor(&self) -> PlaybackCursor {
        self.cursor
    }

    pub fn is_running(&self) -> bool {
        !matches!(self.state, SequencerState::Idle)
    }

    /// The firing currently outstanding, if any
    pub fn pending(&self) -> Option<Reschedule> {
        match self.state {
            SequencerState::Scheduled { token, at } => Some(Reschedule { token, at }),
            _ => None,
        }
    }

    fn schedule(&mut self, at: f64) -> Reschedule {
        self.generation += 1;
        let token = self.generation;
        self.state = SequencerState::Scheduled { token, at };
        self.cursor.next_fire = at;
        Reschedule { token, at }
    }

    /// Start playing; the first measure is due immediately. Returns `None` if the
    /// loop is already running, so a second start never doubles it.
    pub fn start(&mut self, now: f64) -> Option<Reschedule> {
        if self.is_running() {
            log::debug!("sequencer already running, start ignored");
            return None;
        }
        Some(self.schedule(now))
    }

    /// Cancel the pending firing. Returns false if nothing was running.
    pub fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.generation += 1;
        self.state = SequencerState::Idle;
        true
    }

    /// Play the measure for `token` and schedule the next one.
    ///
    /// Stale tokens (from before a stop or restart) are ignored and return `None`.
    pub fn fire<S: Synth>(
        &mut self,
        token: u64,
        now: f64,
        speed_ratio: f32,
        engine: &mut AudioEngine<S>,
    ) -> Option<Reschedule> {
        match self.state {
            SequencerState::Scheduled { token: expected, .. } if expected == token => {}
            _ => {
                log::debug!("ignoring stale music firing {token}");
                return None;
            }
        }
        self.state = SequencerState::Playing { token };

        let ratio = sane_ratio(speed_ratio);
        let song = Song::for_speed_ratio(ratio);
        if self.cursor.song != Some(song) {
            log::info!("Music: switching to {} at {ratio:.2}x", song.id());
            self.cursor.song = Some(song);
            self.cursor.measure = 0;
        }

        let Some(composition) = self.sheet.song(song) else {
            log::warn!("Music sheet has no '{}', stopping", song.id());
            self.stop();
            return None;
        };

        let tempo = tempo(composition.tempo.unwrap_or(self.base_tempo), ratio);
        let beat = beat_duration(tempo);
        let beats_per_measure = composition.beats_per_measure.max(1);

        if let Some(measure) = composition.measure(self.cursor.measure) {
            let tones = render_measure(
                measure,
                engine.current_time(),
                beat,
                ratio,
                beats_per_measure,
                engine.settings().effective_music_volume(),
            );
            for tone in tones {
                engine.submit(tone);
            }
        }
        self.cursor.measure = (self.cursor.measure + 1) % composition.measures.len().max(1);

        Some(self.schedule(now + beat * beats_per_measure as f64))
    }
}
