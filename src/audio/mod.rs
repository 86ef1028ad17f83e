//! Audio system over an external synthesis backend
//!
//! Everything audible is a scheduled tone: an oscillator shape, a start time on the
//! backend's clock, a duration and a gain envelope. Sound effects and the measure
//! sequencer both go through [`AudioEngine`], which drops tones while the backend's
//! context is suspended and drives the bounded resume retry.

pub mod music;
pub mod sequencer;
pub mod sheet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RunnerError};
use crate::settings::Settings;
use crate::sim::collision::ScoreTier;
use crate::sim::state::{GameEvent, SoundCue};

pub use music::{BackgroundMusic, ProceduralMusic, StreamedTrack};
pub use sequencer::{Reschedule, Sequencer, SequencerState};
pub use sheet::{MusicSheet, Song};

/// Resume attempts before the backend is rebuilt
pub const RESUME_ATTEMPTS: u32 = 3;
/// Delay between resume attempts (seconds)
pub const RESUME_BACKOFF: f64 = 0.1;

/// Oscillator shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

/// Linear attack to `peak`, then exponential decay to `floor` at `decay_end`.
/// Times are seconds from the tone's start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub peak: f32,
    pub attack: f64,
    pub decay_end: f64,
    pub floor: f32,
}

impl Envelope {
    pub fn new(peak: f32, attack: f64, decay_end: f64, floor: f32) -> Self {
        Self {
            peak,
            attack,
            decay_end: decay_end.max(attack),
            floor,
        }
    }

    /// Gain `t` seconds after the tone starts
    pub fn gain_at(&self, t: f64) -> f32 {
        if t <= 0.0 || self.peak <= 0.0 {
            return 0.0;
        }
        if t < self.attack {
            return self.peak * (t / self.attack) as f32;
        }
        if self.peak <= self.floor || self.decay_end <= self.attack {
            return self.peak.min(self.floor.max(0.0));
        }
        let progress = ((t - self.attack) / (self.decay_end - self.attack)).min(1.0);
        self.peak * (self.floor / self.peak).powf(progress as f32)
    }
}

/// One tone for the synthesis backend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneRequest {
    pub frequency: f32,
    pub waveform: Waveform,
    /// Start on the backend clock (seconds)
    pub start: f64,
    pub duration: f64,
    pub envelope: Envelope,
}

/// Backend context state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextState {
    Suspended,
    Running,
}

/// The synthesis backend
pub trait Synth {
    fn schedule_tone(&mut self, tone: ToneRequest);

    fn context_state(&self) -> ContextState;

    /// Try to move a suspended context to running
    fn resume(&mut self) -> Result<()>;

    /// Tear down and rebuild the context (last resort after failed resumes)
    fn reinitialize(&mut self) -> Result<()>;

    /// Backend clock (seconds)
    fn current_time(&self) -> f64;
}

/// Backend that records every scheduled tone instead of playing it
#[derive(Debug, Clone)]
pub struct RecordingSynth {
    pub tones: Vec<ToneRequest>,
    pub resume_calls: u32,
    pub reinit_calls: u32,
    state: ContextState,
    time: f64,
    /// Resume calls that fail before one succeeds
    resume_failures: u32,
    reinit_fails: bool,
}

impl Default for RecordingSynth {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSynth {
    /// A running backend
    pub fn new() -> Self {
        Self {
            tones: Vec::new(),
            resume_calls: 0,
            reinit_calls: 0,
            state: ContextState::Running,
            time: 0.0,
            resume_failures: 0,
            reinit_fails: false,
        }
    }

    /// A suspended backend whose first `failures` resume calls fail
    pub fn suspended(failures: u32) -> Self {
        Self {
            state: ContextState::Suspended,
            resume_failures: failures,
            ..Self::new()
        }
    }

    pub fn with_failing_reinit(mut self) -> Self {
        self.reinit_fails = true;
        self
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub fn suspend(&mut self) {
        self.state = ContextState::Suspended;
    }
}

impl Synth for RecordingSynth {
    fn schedule_tone(&mut self, tone: ToneRequest) {
        self.tones.push(tone);
    }

    fn context_state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<()> {
        self.resume_calls += 1;
        if self.resume_failures > 0 {
            self.resume_failures -= 1;
            return Err(RunnerError::AudioContextSuspended);
        }
        self.state = ContextState::Running;
        Ok(())
    }

    fn reinitialize(&mut self) -> Result<()> {
        self.reinit_calls += 1;
        if self.reinit_fails {
            return Err(RunnerError::AudioBackend("no output device".into()));
        }
        self.state = ContextState::Running;
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.time
    }
}

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundEffect {
    /// Lane change
    Move,
    Jump,
    /// Coin pickup, louder at higher score tiers
    Coin(ScoreTier),
    /// Bonus coin pickup
    BonusCoin,
    /// Player hit an obstacle
    Collision,
    /// Run over (plays shortly after the collision)
    GameOver,
}

impl From<SoundCue> for SoundEffect {
    fn from(cue: SoundCue) -> Self {
        match cue {
            SoundCue::Move => SoundEffect::Move,
            SoundCue::Jump => SoundEffect::Jump,
            SoundCue::Coin { bonus: false, tier } => SoundEffect::Coin(tier),
            SoundCue::Coin { bonus: true, .. } => SoundEffect::BonusCoin,
            SoundCue::Collision => SoundEffect::Collision,
            SoundCue::GameOver => SoundEffect::GameOver,
        }
    }
}

impl SoundEffect {
    /// Beep frequency (Hz) and length (s)
    fn beep(self) -> (f32, f64) {
        match self {
            SoundEffect::Move => (200.0, 0.1),
            SoundEffect::Coin(_) | SoundEffect::BonusCoin => (800.0, 0.2),
            SoundEffect::Collision => (100.0, 0.5),
            SoundEffect::GameOver => (150.0, 1.0),
            SoundEffect::Jump => (400.0, 0.15),
        }
    }

    /// Per-effect volume
    fn volume(self) -> f32 {
        match self {
            SoundEffect::Move => 0.5,
            SoundEffect::Jump => 0.4,
            SoundEffect::Coin(ScoreTier::Low) => 0.5,
            SoundEffect::Coin(ScoreTier::Medium) => 0.6,
            SoundEffect::Coin(ScoreTier::High) => 0.7,
            SoundEffect::Coin(ScoreTier::Ultra) | SoundEffect::Collision => 0.8,
            SoundEffect::Coin(ScoreTier::Legendary) | SoundEffect::BonusCoin => 0.9,
            SoundEffect::GameOver => 0.9,
        }
    }

    /// Seconds after the trigger before the effect starts
    fn delay(self) -> f64 {
        match self {
            SoundEffect::GameOver => 0.2,
            _ => 0.0,
        }
    }

    /// Second chime (volume, delay) played after the first
    fn echo(self) -> Option<(f32, f64)> {
        match self {
            SoundEffect::Coin(ScoreTier::Legendary) => Some((0.7, 0.1)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ResumeState {
    Idle,
    Retrying { attempt: u32, next_at: f64 },
    /// Resume and reinitialize both failed; audio stays silent
    Failed,
}

/// Audio manager for the game
pub struct AudioEngine<S: Synth> {
    synth: S,
    settings: Settings,
    /// Browsers (and similar hosts) only allow audio after the first user gesture
    unlocked: bool,
    resume: ResumeState,
    dropped: u64,
}

impl<S: Synth> AudioEngine<S> {
    pub fn new(synth: S, settings: Settings) -> Self {
        Self {
            synth,
            settings,
            unlocked: false,
            resume: ResumeState::Idle,
            dropped: 0,
        }
    }

    pub fn synth(&self) -> &S {
        &self.synth
    }

    pub fn synth_mut(&mut self) -> &mut S {
        &mut self.synth
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn current_time(&self) -> f64 {
        self.synth.current_time()
    }

    /// Tones dropped because audio was locked, muted or suspended
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Unlocked, unmuted and the context is running
    pub fn is_ready(&self) -> bool {
        self.unlocked
            && !self.settings.muted
            && self.synth.context_state() == ContextState::Running
    }

    /// First user interaction: allow audio and start resuming the context.
    /// Returns false if audio was already unlocked.
    pub fn unlock(&mut self, now: f64) -> bool {
        if self.unlocked {
            return false;
        }
        self.unlocked = true;
        log::info!("Audio unlocked by user interaction");
        self.request_resume(now);
        true
    }

    /// Begin the bounded resume retry if the context is suspended
    pub fn request_resume(&mut self, now: f64) {
        if self.synth.context_state() == ContextState::Running {
            self.resume = ResumeState::Idle;
            return;
        }
        if matches!(self.resume, ResumeState::Retrying { .. }) {
            return;
        }
        self.resume = ResumeState::Retrying {
            attempt: 0,
            next_at: now,
        };
        self.poll(now);
    }

    /// Unlocked, but the backend has dropped back to suspended
    fn suspended_after_unlock(&self) -> bool {
        self.unlocked && self.synth.context_state() == ContextState::Suspended
    }

    /// Drive the resume retry; call every frame. A suspension noticed here
    /// starts a fresh retry.
    pub fn poll(&mut self, now: f64) {
        if self.resume == ResumeState::Idle && self.suspended_after_unlock() {
            log::warn!("Audio context suspended, resuming");
            self.resume = ResumeState::Retrying {
                attempt: 0,
                next_at: now,
            };
        }
        let ResumeState::Retrying { attempt, next_at } = self.resume else {
            return;
        };
        if now < next_at {
            return;
        }

        match self.synth.resume() {
            Ok(()) => {
                log::info!("Audio context resumed (attempt {}/{RESUME_ATTEMPTS})", attempt + 1);
                self.resume = ResumeState::Idle;
            }
            Err(e) if attempt + 1 < RESUME_ATTEMPTS => {
                log::warn!("Resume attempt {}/{RESUME_ATTEMPTS} failed: {e}", attempt + 1);
                self.resume = ResumeState::Retrying {
                    attempt: attempt + 1,
                    next_at: now + RESUME_BACKOFF,
                };
            }
            Err(e) => {
                log::warn!("Resume failed {RESUME_ATTEMPTS} times ({e}), reinitializing backend");
                self.resume = match self.synth.reinitialize() {
                    Ok(()) => ResumeState::Idle,
                    Err(e) => {
                        log::error!("Audio backend reinitialization failed: {e}");
                        ResumeState::Failed
                    }
                };
            }
        }
    }

    /// Hand a tone to the backend; dropped unless [`is_ready`](Self::is_ready)
    pub fn submit(&mut self, tone: ToneRequest) -> bool {
        if !self.is_ready() && self.suspended_after_unlock() {
            // Also retries after a failed reinitialize
            self.request_resume(self.synth.current_time());
        }
        if !self.is_ready() {
            self.dropped += 1;
            return false;
        }
        self.synth.schedule_tone(tone);
        true
    }

    /// Play a sound effect now (or after its built-in delay)
    pub fn play(&mut self, effect: SoundEffect) -> bool {
        let gain = self.settings.effective_sfx_volume();
        if gain * effect.volume() <= 0.0 {
            return false;
        }
        let played = self.beep(effect, gain * effect.volume(), effect.delay());
        if played {
            if let Some((volume, delay)) = effect.echo() {
                self.beep(effect, gain * volume, delay);
            }
        }
        played
    }

    fn beep(&mut self, effect: SoundEffect, vol: f32, delay: f64) -> bool {
        let (frequency, duration) = effect.beep();
        let tone = ToneRequest {
            frequency,
            waveform: Waveform::Square,
            start: self.synth.current_time() + delay,
            duration,
            envelope: Envelope::new(0.3 * vol, 0.01, duration, 0.01),
        };
        self.submit(tone)
    }

    /// Play the sound cues in a batch of game events; returns how many were scheduled
    pub fn handle_events(&mut self, events: &[GameEvent]) -> usize {
        events
            .iter()
            .filter_map(|event| match event {
                GameEvent::Sound(cue) => Some(SoundEffect::from(*cue)),
                _ => None,
            })
            .filter(|effect| self.play(*effect))
            .count()
    }

    /// Flip mute; muting pauses the background music and unmuting resumes it
    pub fn toggle_mute(&mut self, music: &mut BackgroundMusic, now: f64) -> bool {
        self.settings.muted = !self.settings.muted;
        if self.settings.muted {
            music.pause();
        } else {
            music.play(now);
        }
        log::info!("Audio {}", if self.settings.muted { "muted" } else { "unmuted" });
        self.settings.muted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_engine() -> AudioEngine<RecordingSynth> {
        let mut engine = AudioEngine::new(RecordingSynth::new(), Settings::default());
        engine.unlock(0.0);
        engine
    }

    #[test]
    fn test_envelope_shape() {
        let env = Envelope::new(0.3, 0.01, 0.2, 0.01);
        assert_eq!(env.gain_at(0.0), 0.0);
        assert!((env.gain_at(0.005) - 0.15).abs() < 1e-6);
        assert!((env.gain_at(0.01) - 0.3).abs() < 1e-6);
        assert!((env.gain_at(0.2) - 0.01).abs() < 1e-6);
        assert!(env.gain_at(0.1) < 0.3 && env.gain_at(0.1) > 0.01);
    }

    #[test]
    fn test_locked_engine_drops_tones() {
        let mut engine = AudioEngine::new(RecordingSynth::new(), Settings::default());
        assert!(!engine.play(SoundEffect::Coin(ScoreTier::Low)));
        assert_eq!(engine.dropped(), 1);
        assert!(engine.synth().tones.is_empty());
    }

    #[test]
    fn test_sfx_parameters() {
        let mut engine = ready_engine();
        engine.synth_mut().set_time(2.0);
        assert!(engine.play(SoundEffect::Move));
        assert!(engine.play(SoundEffect::GameOver));

        let tones = &engine.synth().tones;
        assert_eq!(tones[0].frequency, 200.0);
        assert_eq!(tones[0].waveform, Waveform::Square);
        assert_eq!(tones[0].start, 2.0);
        assert_eq!(tones[0].duration, 0.1);
        assert!((tones[0].envelope.peak - 0.15).abs() < 1e-6);
        assert_eq!(tones[1].frequency, 150.0);
        assert!((tones[1].start - 2.2).abs() < 1e-9);
    }

    #[test]
    fn test_mute_silences_effects() {
        let mut engine = ready_engine();
        engine.settings_mut().muted = true;
        assert!(!engine.play(SoundEffect::Jump));
        assert!(engine.synth().tones.is_empty());
    }

    #[test]
    fn test_handle_events_plays_cues_only() {
        let mut engine = ready_engine();
        let events = vec![
            GameEvent::Sound(SoundCue::Coin {
                bonus: true,
                tier: ScoreTier::Low,
            }),
            GameEvent::GameOver { final_score: 10 },
            GameEvent::Sound(SoundCue::Collision),
        ];
        assert_eq!(engine.handle_events(&events), 2);
        assert_eq!(engine.synth().tones[0].frequency, 800.0);
        assert_eq!(engine.synth().tones[1].frequency, 100.0);
    }

    #[test]
    fn test_resume_succeeds_on_retry() {
        let mut engine = AudioEngine::new(RecordingSynth::suspended(1), Settings::default());
        engine.unlock(0.0);
        assert!(!engine.is_ready());
        assert!(!engine.play(SoundEffect::Coin(ScoreTier::Low)));

        engine.poll(0.05);
        assert_eq!(engine.synth().resume_calls, 1);
        engine.poll(0.1);
        assert_eq!(engine.synth().resume_calls, 2);
        assert!(engine.is_ready());
        assert_eq!(engine.synth().reinit_calls, 0);
    }

    #[test]
    fn test_three_failures_reinitialize() {
        let mut engine = AudioEngine::new(RecordingSynth::suspended(10), Settings::default());
        engine.unlock(0.0);
        engine.poll(0.1);
        engine.poll(0.2);
        assert_eq!(engine.synth().resume_calls, RESUME_ATTEMPTS);
        assert_eq!(engine.synth().reinit_calls, 1);
        assert!(engine.is_ready());

        // Later polls do nothing
        engine.poll(5.0);
        assert_eq!(engine.synth().resume_calls, RESUME_ATTEMPTS);
    }

    #[test]
    fn test_failed_reinit_stays_silent() {
        let synth = RecordingSynth::suspended(10).with_failing_reinit();
        let mut engine = AudioEngine::new(synth, Settings::default());
        engine.unlock(0.0);
        engine.poll(0.1);
        engine.poll(0.2);
        assert_eq!(engine.synth().reinit_calls, 1);
        assert!(!engine.is_ready());
        assert!(!engine.play(SoundEffect::Move));
    }

    #[test]
    fn test_unlock_only_once() {
        let mut engine = AudioEngine::new(RecordingSynth::new(), Settings::default());
        assert!(engine.unlock(0.0));
        assert!(!engine.unlock(1.0));
    }

    #[test]
    fn test_suspension_after_unlock_resumes() {
        let mut engine = ready_engine();
        engine.synth_mut().suspend();
        assert!(!engine.is_ready());

        for frame in 0..600 {
            let now = frame as f64 / 60.0;
            engine.synth_mut().set_time(now);
            engine.play(SoundEffect::Coin(ScoreTier::Low));
            engine.poll(now);
        }
        assert!(engine.synth().resume_calls > 0);
        assert!(engine.is_ready());
        assert!(!engine.synth().tones.is_empty());
    }

    #[test]
    fn test_poll_notices_suspension() {
        let mut engine = ready_engine();
        engine.synth_mut().suspend();
        engine.poll(1.0);
        assert_eq!(engine.synth().resume_calls, 1);
        assert!(engine.is_ready());
    }

    #[test]
    fn test_sound_retries_after_failed_reinit() {
        let synth = RecordingSynth::suspended(3).with_failing_reinit();
        let mut engine = AudioEngine::new(synth, Settings::default());
        engine.unlock(0.0);
        engine.poll(0.1);
        engine.poll(0.2);
        assert_eq!(engine.synth().reinit_calls, 1);

        // Polling alone leaves a failed backend alone
        engine.poll(5.0);
        assert_eq!(engine.synth().resume_calls, RESUME_ATTEMPTS);

        // A new sound starts another round
        assert!(engine.play(SoundEffect::Move));
        assert_eq!(engine.synth().resume_calls, RESUME_ATTEMPTS + 1);
        assert!(engine.is_ready());
    }

    #[test]
    fn test_coin_volume_follows_tier() {
        let cases = [
            (ScoreTier::Low, 0.5),
            (ScoreTier::Medium, 0.6),
            (ScoreTier::High, 0.7),
            (ScoreTier::Ultra, 0.8),
            (ScoreTier::Legendary, 0.9),
        ];
        for (tier, volume) in cases {
            let mut engine = ready_engine();
            let cue = SoundCue::Coin { bonus: false, tier };
            assert!(engine.play(SoundEffect::from(cue)));
            let tone = engine.synth().tones[0];
            assert_eq!(tone.frequency, 800.0);
            assert!((tone.envelope.peak - 0.3 * volume).abs() < 1e-6, "{tier:?}");
        }
    }

    #[test]
    fn test_legendary_coin_chimes_twice() {
        let mut engine = ready_engine();
        engine.synth_mut().set_time(3.0);
        engine.play(SoundEffect::Coin(ScoreTier::Legendary));

        let tones = &engine.synth().tones;
        assert_eq!(tones.len(), 2);
        assert_eq!(tones[0].start, 3.0);
        assert!((tones[1].start - 3.1).abs() < 1e-9);
        assert!((tones[1].envelope.peak - 0.3 * 0.7).abs() < 1e-6);

        let mut engine = ready_engine();
        engine.play(SoundEffect::Coin(ScoreTier::Ultra));
        assert_eq!(engine.synth().tones.len(), 1);
    }

    #[test]
    fn test_bonus_coin_ignores_tier() {
        let mut engine = ready_engine();
        let cue = SoundCue::Coin {
            bonus: true,
            tier: ScoreTier::Legendary,
        };
        assert_eq!(SoundEffect::from(cue), SoundEffect::BonusCoin);
        engine.play(SoundEffect::BonusCoin);
        assert_eq!(engine.synth().tones.len(), 1);
        assert!((engine.synth().tones[0].envelope.peak - 0.27).abs() < 1e-6);
    }
}
