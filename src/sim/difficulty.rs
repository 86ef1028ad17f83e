//! Difficulty curve
//!
//! Pure derivation from distance traveled. Every value is a capped linear function of
//! `level = floor(distance / level_distance)`, cheap enough to recompute every tick.

use serde::{Deserialize, Serialize};

use crate::tuning::Tuning;

/// Parameters derived from the current difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Difficulty {
    pub level: u32,
    /// Speed the run is accelerating toward
    pub target_speed: f32,
    pub obstacle_chance: f32,
    pub coin_chance: f32,
    /// Value of a normal coin at this level
    pub coin_value: u32,
}

impl Difficulty {
    /// Difficulty level for a distance
    pub fn level_for(distance: f32, tuning: &Tuning) -> u32 {
        if distance <= 0.0 || tuning.level_distance <= 0.0 {
            return 0;
        }
        (distance / tuning.level_distance).floor().min(u32::MAX as f32) as u32
    }

    pub fn for_distance(distance: f32, tuning: &Tuning) -> Self {
        Self::for_level(Self::level_for(distance, tuning), tuning)
    }

    pub fn for_level(level: u32, tuning: &Tuning) -> Self {
        let lvl = level as f32;
        let target_speed = (tuning.initial_speed + lvl * tuning.speed_per_level).min(tuning.max_speed);
        let obstacle_chance = (tuning.base_obstacle_chance + lvl * tuning.obstacle_chance_per_level)
            .min(tuning.max_obstacle_chance);
        let coin_chance =
            (tuning.base_coin_chance + lvl * tuning.coin_chance_per_level).min(tuning.max_coin_chance);
        let growth = 1.0 + level as f64 * tuning.coin_value_growth as f64;
        let coin_value = (tuning.base_coin_value as f64 * growth)
            .floor()
            .min(u32::MAX as f64) as u32;

        Self {
            level,
            target_speed,
            obstacle_chance,
            coin_chance,
            coin_value,
        }
    }
}

/// Advance speed by one tick: steady growth plus a catch-up step while below the
/// difficulty target. Never exceeds `max_speed`.
pub fn advance_speed(speed: f32, difficulty: &Difficulty, tuning: &Tuning) -> f32 {
    let mut speed = speed;
    if speed < tuning.max_speed {
        speed += tuning.speed_increase;
    }
    if speed < difficulty.target_speed {
        speed += tuning.speed_increase * tuning.catch_up_multiplier;
    }
    speed.min(tuning.max_speed)
}
