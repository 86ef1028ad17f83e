//! Spawn planning for newly generated segments
//!
//! Each new segment gets at most one placement: an obstacle pattern, a coin
//! pattern, or nothing. The opening of a run is a coins-only safety window, the first
//! obstacle after it is guaranteed, and the richer patterns unlock with difficulty.

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::difficulty::Difficulty;
use super::pool::{Coin, Pools, Segment};
use crate::lane_x;
use crate::tuning::Tuning;

/// Obstacle formations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObstaclePattern {
    /// One obstacle in a random lane
    Single,
    /// Two random lanes blocked
    Double,
    /// Two lanes blocked around one chosen open lane
    Gap,
}

impl ObstaclePattern {
    const ALL: [ObstaclePattern; 3] = [Self::Single, Self::Double, Self::Gap];

    /// Degrade patterns that are not unlocked at `level`
    pub fn gated(self, level: u32) -> Self {
        match self {
            Self::Double if level < 2 => Self::Single,
            Self::Gap if level < 3 => Self::Single,
            other => other,
        }
    }
}

/// Coin formations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoinPattern {
    /// Up to 5 coins down one lane
    Line,
    /// Up to 6 coins changing lane every second coin
    ZigZag,
    /// Up to 9 coins in a 3x3 lane/height grid
    Wall,
    /// Up to 3 bonus coins across the lanes
    Bonus,
}

impl CoinPattern {
    const ALL: [CoinPattern; 4] = [Self::Line, Self::ZigZag, Self::Wall, Self::Bonus];

    /// Degrade patterns that are not unlocked; `bonus_draw` is the extra draw the
    /// bonus pattern must also pass
    pub fn gated(self, level: u32, bonus_draw: bool) -> Self {
        match self {
            Self::ZigZag if level < 1 => Self::Line,
            Self::Wall if level < 2 => Self::Line,
            Self::Bonus if level < 3 || !bonus_draw => Self::Line,
            other => other,
        }
    }
}

/// What ended up on a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    Empty,
    Obstacles { pattern: ObstaclePattern, count: usize },
    Coins { pattern: CoinPattern, count: usize },
}

/// Decision record for one segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnOutcome {
    pub in_safety_window: bool,
    /// Obstacle probability actually used (0 inside the safety window)
    pub obstacle_chance: f32,
    pub placement: Placement,
}

/// Inputs the planner reads for one decision
#[derive(Debug, Clone, Copy)]
pub struct SpawnContext {
    /// Seconds since the run started
    pub elapsed: f64,
    pub distance: f32,
    pub difficulty: Difficulty,
    /// This tick's segment length
    pub segment_length: f32,
}

impl SpawnContext {
    /// Obstacles are suppressed until both the time and the distance marks pass
    pub fn in_safety_window(&self, tuning: &Tuning) -> bool {
        self.elapsed < tuning.safety_seconds || self.distance < tuning.safety_distance
    }
}

/// Per-run spawn state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpawnPlanner {
    obstacles_placed: u32,
}

impl SpawnPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Obstacles placed since the last reset
    pub fn obstacles_placed(&self) -> u32 {
        self.obstacles_placed
    }

    pub fn reset(&mut self) {
        self.obstacles_placed = 0;
    }

    /// Obstacle probability for the next segment, or `None` inside the safety window
    pub fn obstacle_chance(&self, ctx: &SpawnContext, tuning: &Tuning) -> Option<f32> {
        if ctx.in_safety_window(tuning) {
            return None;
        }
        let chance = if self.obstacles_placed == 0 {
            1.0
        } else if ctx.distance < tuning.early_distance {
            ctx.difficulty.obstacle_chance.max(tuning.early_obstacle_floor)
        } else {
            ctx.difficulty.obstacle_chance
        };
        Some(chance)
    }

    /// Decide and place collectibles on a freshly activated segment
    pub fn plan<R: Rng + ?Sized>(
        &mut self,
        segment: &Segment,
        ctx: &SpawnContext,
        pools: &mut Pools,
        tuning: &Tuning,
        rng: &mut R,
    ) -> SpawnOutcome {
        // Anything left over inside this span belongs to a previous lap of the pool
        pools.clear_span(segment);

        let roll: f32 = rng.random();
        let level = ctx.difficulty.level;

        let Some(obstacle_chance) = self.obstacle_chance(ctx, tuning) else {
            let placement = if roll < tuning.safety_coin_chance {
                place_coins(segment, ctx, level, pools, tuning, rng)
            } else {
                Placement::Empty
            };
            log::debug!(
                "safety window ({:.1}s, {:.1} units): {:?}",
                ctx.elapsed,
                ctx.distance,
                placement
            );
            return SpawnOutcome {
                in_safety_window: true,
                obstacle_chance: 0.0,
                placement,
            };
        };

        let placement = if roll < obstacle_chance {
            let placement = place_obstacles(segment, ctx, level, pools, rng);
            if let Placement::Obstacles { count, .. } = placement {
                if self.obstacles_placed == 0 && count > 0 {
                    log::info!("First obstacle placed after {:.1}s", ctx.elapsed);
                }
                self.obstacles_placed += count as u32;
            }
            placement
        } else if roll < obstacle_chance + ctx.difficulty.coin_chance {
            place_coins(segment, ctx, level, pools, tuning, rng)
        } else {
            Placement::Empty
        };

        log::debug!(
            "segment {} at z={:.1}: chance {:.2}, roll {:.2} -> {:?}",
            segment.id,
            segment.position.z,
            obstacle_chance,
            roll,
            placement
        );

        SpawnOutcome {
            in_safety_window: false,
            obstacle_chance,
            placement,
        }
    }
}

/// Random z inside the first 80% of the segment
fn obstacle_z<R: Rng + ?Sized>(segment: &Segment, length: f32, rng: &mut R) -> f32 {
    segment.position.z - rng.random::<f32>() * length * 0.8
}

fn place_obstacle_in_lane<R: Rng + ?Sized>(
    segment: &Segment,
    lane: usize,
    length: f32,
    pools: &mut Pools,
    rng: &mut R,
) -> bool {
    let Some(handle) = pools.obstacles.acquire() else {
        return false;
    };
    let z = obstacle_z(segment, length, rng);
    let obstacle = &mut pools.obstacles[handle];
    obstacle.position = Vec3::new(lane_x(lane), obstacle.kind.rest_height(), z);
    true
}

fn place_obstacles<R: Rng + ?Sized>(
    segment: &Segment,
    ctx: &SpawnContext,
    level: u32,
    pools: &mut Pools,
    rng: &mut R,
) -> Placement {
    let mut pattern = ObstaclePattern::ALL[rng.random_range(0..ObstaclePattern::ALL.len())].gated(level);
    if pattern != ObstaclePattern::Single && pools.obstacles.free_len() < 2 {
        pattern = ObstaclePattern::Single;
    }
    let length = ctx.segment_length;

    let lanes: Vec<usize> = match pattern {
        ObstaclePattern::Single => vec![rng.random_range(0..3)],
        ObstaclePattern::Double => {
            let first = rng.random_range(0..3);
            let second = (first + rng.random_range(1..3)) % 3;
            vec![first, second]
        }
        ObstaclePattern::Gap => {
            let open = rng.random_range(0..3);
            (0..3).filter(|lane| *lane != open).collect()
        }
    };

    let count = lanes
        .into_iter()
        .filter(|lane| place_obstacle_in_lane(segment, *lane, length, pools, rng))
        .count();

    Placement::Obstacles { pattern, count }
}

fn place_coins<R: Rng + ?Sized>(
    segment: &Segment,
    ctx: &SpawnContext,
    level: u32,
    pools: &mut Pools,
    tuning: &Tuning,
    rng: &mut R,
) -> Placement {
    let drawn = CoinPattern::ALL[rng.random_range(0..CoinPattern::ALL.len())];
    let bonus_draw = drawn == CoinPattern::Bonus && rng.random::<f32>() < tuning.bonus_pattern_chance;
    let mut pattern = drawn.gated(level, bonus_draw);
    if pattern == CoinPattern::Bonus && pools.coins.free_count_where(Coin::is_bonus) == 0 {
        pattern = CoinPattern::Line;
    }

    let z0 = segment.position.z;
    let length = ctx.segment_length;
    let mut spots: Vec<Vec3> = Vec::with_capacity(9);
    match pattern {
        CoinPattern::Line => {
            let x = lane_x(rng.random_range(0..3));
            let start = z0 - length * 0.2;
            spots.extend((0..5).map(|i| Vec3::new(x, 1.2, start - i as f32 * 3.0)));
        }
        CoinPattern::ZigZag => {
            let mut lane = rng.random_range(0..3);
            let start = z0 - length * 0.1;
            for i in 0..6 {
                spots.push(Vec3::new(lane_x(lane), 1.2, start - i as f32 * 4.0));
                if i % 2 == 1 {
                    lane = (lane + 1) % 3;
                }
            }
        }
        CoinPattern::Wall => {
            let start = z0 - length * 0.3;
            for row in 0..3 {
                for lane in 0..3 {
                    spots.push(Vec3::new(
                        lane_x(lane),
                        1.2 + row as f32 * 0.8,
                        start - row as f32 * 2.0,
                    ));
                }
            }
        }
        CoinPattern::Bonus => {
            let start = z0 - length * 0.4;
            spots.extend((0..3).map(|lane| Vec3::new(lane_x(lane), 1.5, start)));
        }
    }

    let mut count = 0;
    for spot in spots {
        let handle = if pattern == CoinPattern::Bonus {
            pools.coins.acquire_where(Coin::is_bonus)
        } else {
            pools.coins.acquire_where(|c| !c.is_bonus())
        };
        let Some(handle) = handle else { break };
        pools.coins[handle].position = spot;
        count += 1;
    }

    Placement::Coins { pattern, count }
}
