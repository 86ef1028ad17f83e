//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - One frame tick per call, fixed per-tick increments
//! - Seeded RNG only
//! - Wall-clock time is passed in, never read
//! - No rendering or audio dependencies

pub mod collision;
pub mod difficulty;
pub mod pool;
pub mod spawn;
pub mod state;
pub mod tick;
pub mod track;

pub use collision::{Aabb, CollisionReport, ScoreTier, resolve_collisions};
pub use difficulty::{Difficulty, advance_speed};
pub use pool::{
    Coin, CoinKind, EntityKind, Handle, Obstacle, ObstacleKind, Pool, Poolable, Pools, Segment,
};
pub use spawn::{CoinPattern, ObstaclePattern, Placement, SpawnContext, SpawnOutcome, SpawnPlanner};
pub use state::{
    GameEvent, JumpState, Player, RunState, SoundCue, SpeedSignal, SpeedSnapshot,
};
pub use tick::{CameraRig, Game, TickInput, TickSummary, tick};
pub use track::{Track, TrackUpdate, segment_length};
