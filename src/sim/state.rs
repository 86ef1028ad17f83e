//! Run state and the signals the simulation publishes
//!
//! `RunState` is owned by the driver; only the driver and the collision pass mutate
//! it. Everything else reads it or reads the `SpeedSnapshot` published each tick.

use std::cell::Cell;
use std::rc::Rc;

use glam::Vec3;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::collision::ScoreTier;
use crate::consts::{PLAYER_GROUND_Y, START_LANE};

/// Vertical state of the player
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JumpState {
    Grounded,
    /// In the air with the given vertical velocity (units/tick)
    Airborne { velocity: f32 },
}

/// Mutable state of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Lane index (0..=2)
    pub lane: usize,
    pub jump: JumpState,
    /// Cumulative distance traveled
    pub distance: f32,
    /// Current speed (units/tick)
    pub speed: f32,
    pub score: u64,
    pub game_over: bool,
    /// Wall-clock second the run started
    pub run_start: f64,
    /// Frame ticks since the run started
    pub ticks: u64,
}

impl RunState {
    pub fn new(initial_speed: f32, now: f64) -> Self {
        Self {
            lane: START_LANE,
            jump: JumpState::Grounded,
            distance: 0.0,
            speed: initial_speed,
            score: 0,
            game_over: false,
            run_start: now,
            ticks: 0,
        }
    }

    /// Seconds since the run started
    pub fn elapsed(&self, now: f64) -> f64 {
        (now - self.run_start).max(0.0)
    }

    pub fn is_airborne(&self) -> bool {
        matches!(self.jump, JumpState::Airborne { .. })
    }
}

/// The player's body; position drives the collision box and the camera
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub position: Vec3,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, PLAYER_GROUND_Y, 0.0),
        }
    }
}

/// Sounds the simulation asks the audio layer to play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoundCue {
    Move,
    Jump,
    /// Coin pickup; `tier` is the score tier after the pickup
    Coin { bonus: bool, tier: ScoreTier },
    Collision,
    GameOver,
}

/// Events published to presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A coin was collected
    ScoreEffect {
        score: u64,
        tier: ScoreTier,
        bonus: bool,
    },
    /// Score crossed a tier breakpoint
    TierChanged { from: ScoreTier, to: ScoreTier },
    /// The run ended
    GameOver { final_score: u64 },
    /// A sound effect should play
    Sound(SoundCue),
}

/// Speed-derived values published once per tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedSnapshot {
    /// Current speed divided by initial speed
    pub speed_ratio: f32,
    pub distance: f32,
    /// Tick that produced this snapshot
    pub tick: u64,
}

impl Default for SpeedSnapshot {
    fn default() -> Self {
        Self {
            speed_ratio: 1.0,
            distance: 0.0,
            tick: 0,
        }
    }
}

/// Single shared slot between the frame loop (writer) and the music timer (reader).
///
/// Readers get whatever was published last; it may be a tick or more stale.
#[derive(Debug, Clone, Default)]
pub struct SpeedSignal(Rc<Cell<SpeedSnapshot>>);

impl SpeedSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: SpeedSnapshot) {
        self.0.set(snapshot);
    }

    pub fn read(&self) -> SpeedSnapshot {
        self.0.get()
    }
}

/// RNG state wrapper for reproducible runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn to_rng(&self) -> Pcg32 {
        Pcg32::seed_from_u64(self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_shares_last_publish() {
        let writer = SpeedSignal::new();
        let reader = writer.clone();
        assert_eq!(reader.read().speed_ratio, 1.0);
        writer.publish(SpeedSnapshot {
            speed_ratio: 1.7,
            distance: 42.0,
            tick: 9,
        });
        assert_eq!(reader.read().tick, 9);
        assert_eq!(reader.read().speed_ratio, 1.7);
    }

    #[test]
    fn test_elapsed_never_negative() {
        let run = RunState::new(0.08, 10.0);
        assert_eq!(run.elapsed(9.0), 0.0);
        assert_eq!(run.elapsed(12.5), 2.5);
    }
}
