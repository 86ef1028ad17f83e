//! Lane Runner - simulation core of a three-lane endless runner
//!
//! Core modules:
//! - `sim`: Deterministic simulation (pools, track, spawning, difficulty, collisions)
//! - `audio`: Synthesis-backend interface, sound effects, and the measure sequencer
//! - `scene`: Rendering-backend interface and the pooled-entity mirror
//! - `tuning`: Data-driven game balance
//! - `settings`: Audio preferences

pub mod audio;
pub mod error;
pub mod scene;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use error::{Result, RunnerError};
pub use settings::Settings;
pub use tuning::Tuning;

/// Game configuration constants
pub mod consts {
    /// Frame tick rate the per-tick increments were balanced for
    pub const TICKS_PER_SECOND: f64 = 60.0;

    /// X coordinates of the left, center and right lanes
    pub const LANES: [f32; 3] = [-3.0, 0.0, 3.0];
    /// Lane the player starts in
    pub const START_LANE: usize = 1;
    /// Fraction of the remaining lateral distance covered each tick
    pub const LANE_LERP: f32 = 0.1;

    /// Player box half extents (unit cube)
    pub const PLAYER_HALF_EXTENTS: [f32; 3] = [0.5, 0.5, 0.5];
    /// Resting height of the player's center
    pub const PLAYER_GROUND_Y: f32 = 0.5;
    /// Vertical velocity applied on jump (units/tick)
    pub const JUMP_STRENGTH: f32 = 0.5;
    /// Gravity (units/tick²)
    pub const GRAVITY: f32 = -0.02;

    /// Coin half extents (flat disc facing the player)
    pub const COIN_HALF_EXTENTS: [f32; 3] = [0.4, 0.4, 0.075];
    /// Coin spin per tick (radians)
    pub const COIN_SPIN: f32 = 0.05;

    /// Camera rig: fixed height, trailing distance and look-ahead
    pub const CAMERA_HEIGHT: f32 = 5.5;
    pub const CAMERA_TRAIL: f32 = 10.0;
    pub const CAMERA_LOOK_HEIGHT: f32 = 1.0;
    pub const CAMERA_LOOK_AHEAD: f32 = 5.0;
    pub const CAMERA_LERP: f32 = 0.1;
}

/// X coordinate of a lane index (clamped to the outer lanes)
#[inline]
pub fn lane_x(lane: usize) -> f32 {
    consts::LANES[lane.min(consts::LANES.len() - 1)]
}

/// Quadratic ease-out: `1 - (1 - t)²`, `t` clamped to [0, 1]
#[inline]
pub fn ease_out_quad(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_x_clamps() {
        assert_eq!(lane_x(0), -3.0);
        assert_eq!(lane_x(1), 0.0);
        assert_eq!(lane_x(2), 3.0);
        assert_eq!(lane_x(7), 3.0);
    }

    #[test]
    fn test_ease_out_endpoints() {
        assert_eq!(ease_out_quad(0.0), 0.0);
        assert_eq!(ease_out_quad(1.0), 1.0);
        assert!((ease_out_quad(0.5) - 0.75).abs() < 1e-6);
        assert_eq!(ease_out_quad(-3.0), 0.0);
    }
}
