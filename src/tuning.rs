//! Data-driven game balance
//!
//! Every knob the difficulty curve, spawner, and track generator read lives here so a
//! run can be rebalanced from a JSON file without touching code.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sim::pool::ObstacleKind;

/// How many obstacles of each shape the pool pre-allocates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObstacleMix {
    pub single: usize,
    pub low_barrier: usize,
    pub wall: usize,
    pub double: usize,
    pub triple: usize,
}

impl Default for ObstacleMix {
    fn default() -> Self {
        Self {
            single: 15,
            low_barrier: 10,
            wall: 5,
            double: 0,
            triple: 0,
        }
    }
}

impl ObstacleMix {
    /// Total obstacle capacity
    pub fn total(&self) -> usize {
        self.single + self.low_barrier + self.wall + self.double + self.triple
    }

    /// Shape for the pool slot at `index` (slots are laid out in declaration order)
    pub fn kind_for_slot(&self, index: usize) -> ObstacleKind {
        let mut bound = self.single;
        if index < bound {
            return ObstacleKind::Single;
        }
        bound += self.low_barrier;
        if index < bound {
            return ObstacleKind::LowBarrier;
        }
        bound += self.wall;
        if index < bound {
            return ObstacleKind::Wall;
        }
        bound += self.double;
        if index < bound {
            return ObstacleKind::Double;
        }
        ObstacleKind::Triple
    }
}

/// Game balance parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Tuning {
    // === Speed ===
    /// Speed at run start (units/tick)
    pub initial_speed: f32,
    /// Hard speed ceiling
    pub max_speed: f32,
    /// Unconditional per-tick growth while below max
    pub speed_increase: f32,
    /// Extra growth multiplier applied while below the difficulty target
    pub catch_up_multiplier: f32,

    // === Difficulty ===
    /// Distance per difficulty level
    pub level_distance: f32,
    pub speed_per_level: f32,
    pub base_obstacle_chance: f32,
    pub obstacle_chance_per_level: f32,
    pub max_obstacle_chance: f32,
    pub base_coin_chance: f32,
    pub coin_chance_per_level: f32,
    pub max_coin_chance: f32,
    pub base_coin_value: u32,
    pub coin_value_growth: f32,
    /// Bonus coins are worth this many normal coins
    pub bonus_multiplier: u32,

    // === Spawn safety ===
    pub safety_seconds: f64,
    pub safety_distance: f32,
    /// Chance of a coin run on a segment inside the safety window
    pub safety_coin_chance: f32,
    /// Distance below which obstacle chance is floored
    pub early_distance: f32,
    pub early_obstacle_floor: f32,
    /// Extra draw required before a bonus pattern is used
    pub bonus_pattern_chance: f32,

    // === Track ===
    pub base_segment_length: f32,
    pub max_segment_length: f32,
    pub segment_width: f32,
    /// Speed ratio at which segments reach their maximum length
    pub max_length_speed_ratio: f32,
    pub target_segments: usize,
    /// Segments further than this many lengths behind the player are recycled
    pub recycle_factor: f32,

    // === Pools ===
    pub segment_pool: usize,
    pub obstacle_mix: ObstacleMix,
    pub coin_pool: usize,
    /// Fraction of the coin pool (taken from the end) flagged as bonus coins
    pub bonus_coin_fraction: f32,

    // === Music ===
    pub base_tempo: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            initial_speed: 0.08,
            max_speed: 0.8,
            speed_increase: 0.00008,
            catch_up_multiplier: 3.0,

            level_distance: 200.0,
            speed_per_level: 0.025,
            base_obstacle_chance: 0.7,
            obstacle_chance_per_level: 0.05,
            max_obstacle_chance: 0.8,
            base_coin_chance: 0.85,
            coin_chance_per_level: 0.02,
            max_coin_chance: 0.95,
            base_coin_value: 10,
            coin_value_growth: 0.15,
            bonus_multiplier: 3,

            safety_seconds: 3.0,
            safety_distance: 15.0,
            safety_coin_chance: 0.7,
            early_distance: 100.0,
            early_obstacle_floor: 0.8,
            bonus_pattern_chance: 0.3,

            base_segment_length: 10.0,
            max_segment_length: 50.0,
            segment_width: 10.0,
            max_length_speed_ratio: 10.0,
            target_segments: 10,
            recycle_factor: 3.0,

            segment_pool: 30,
            obstacle_mix: ObstacleMix::default(),
            coin_pool: 50,
            bonus_coin_fraction: 0.2,

            base_tempo: 120.0,
        }
    }
}

impl Tuning {
    /// Parse tuning from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let tuning: Self = serde_json::from_str(json)?;
        Ok(tuning)
    }

    /// Load tuning from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        let tuning = Self::from_json(&json)?;
        log::info!("Loaded tuning from {}", path.as_ref().display());
        Ok(tuning)
    }

    /// Index of the first bonus coin in the coin pool
    pub fn first_bonus_coin(&self) -> usize {
        let bonus = (self.coin_pool as f32 * self.bonus_coin_fraction.clamp(0.0, 1.0)).round();
        self.coin_pool - (bonus as usize).min(self.coin_pool)
    }
}
