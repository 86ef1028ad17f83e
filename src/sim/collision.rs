//! Collision detection and scoring
//!
//! Everything is an axis-aligned box. The player box is computed once per tick and
//! tested against every active obstacle (first hit ends the run) and then against
//! every active coin independently.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::pool::{Coin, Handle, Pools};
use super::state::{GameEvent, RunState, SoundCue};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Overlap test; touching faces count as a hit
    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }
}

/// Score breakpoints used by presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScoreTier {
    Low,
    Medium,
    High,
    Ultra,
    Legendary,
}

impl ScoreTier {
    pub fn for_score(score: u64) -> Self {
        match score {
            0..500 => ScoreTier::Low,
            500..1500 => ScoreTier::Medium,
            1500..3000 => ScoreTier::High,
            3000..5000 => ScoreTier::Ultra,
            _ => ScoreTier::Legendary,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreTier::Low => "low",
            ScoreTier::Medium => "medium",
            ScoreTier::High => "high",
            ScoreTier::Ultra => "ultra",
            ScoreTier::Legendary => "legendary",
        }
    }
}

/// What happened during one collision pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionReport {
    /// Obstacle that ended the run, if any
    pub fatal: Option<Handle>,
    /// Coins picked up this tick
    pub coins: u32,
    /// Points gained this tick
    pub points: u64,
}

/// Value of a coin given the current difficulty value
#[inline]
pub fn coin_worth(coin: &Coin, coin_value: u32, bonus_multiplier: u32) -> u64 {
    let value = coin_value as u64;
    if coin.is_bonus() {
        value * bonus_multiplier as u64
    } else {
        value
    }
}

/// Run the obstacle and coin tests for one tick
pub fn resolve_collisions(
    player: &Aabb,
    pools: &mut Pools,
    run: &mut RunState,
    coin_value: u32,
    bonus_multiplier: u32,
    events: &mut Vec<GameEvent>,
) -> CollisionReport {
    let mut report = CollisionReport::default();
    if run.game_over {
        return report;
    }

    // Obstacles: first hit wins
    let fatal = pools
        .obstacles
        .iter_active()
        .find(|(_, o)| o.visible && player.intersects(&o.aabb()))
        .map(|(h, _)| h);
    if let Some(handle) = fatal {
        run.game_over = true;
        report.fatal = Some(handle);
        log::info!(
            "Hit {:?} obstacle at distance {:.1}, final score {}",
            pools.obstacles[handle].kind,
            run.distance,
            run.score
        );
        events.push(GameEvent::Sound(SoundCue::Collision));
        events.push(GameEvent::GameOver {
            final_score: run.score,
        });
        events.push(GameEvent::Sound(SoundCue::GameOver));
        return report;
    }

    // Coins: each tested independently
    let touched: Vec<Handle> = pools
        .coins
        .iter_active()
        .filter(|(_, c)| c.visible && player.intersects(&c.aabb()))
        .map(|(h, _)| h)
        .collect();

    for handle in touched {
        let coin = &pools.coins[handle];
        let bonus = coin.is_bonus();
        let worth = coin_worth(coin, coin_value, bonus_multiplier);
        if !pools.coins.release(handle) {
            continue;
        }

        let before = ScoreTier::for_score(run.score);
        run.score += worth;
        let tier = ScoreTier::for_score(run.score);
        report.coins += 1;
        report.points += worth;

        events.push(GameEvent::ScoreEffect {
            score: run.score,
            tier,
            bonus,
        });
        events.push(GameEvent::Sound(SoundCue::Coin { bonus, tier }));
        if tier != before {
            log::info!("Score tier {} -> {}", before.as_str(), tier.as_str());
            events.push(GameEvent::TierChanged { from: before, to: tier });
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::pool::CoinKind;
    use crate::tuning::Tuning;

    fn player_at(pos: Vec3) -> Aabb {
        Aabb::from_center(pos, Vec3::splat(0.5))
    }

    #[test]
    fn test_aabb_overlap_and_separation() {
        let a = Aabb::from_center(Vec3::ZERO, Vec3::splat(0.5));
        let b = Aabb::from_center(Vec3::new(0.9, 0.0, 0.0), Vec3::splat(0.5));
        let c = Aabb::from_center(Vec3::new(1.1, 0.0, 0.0), Vec3::splat(0.5));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
        assert_eq!(b.center(), Vec3::new(0.9, 0.0, 0.0));
    }

    #[test]
    fn test_score_tiers() {
        assert_eq!(ScoreTier::for_score(0), ScoreTier::Low);
        assert_eq!(ScoreTier::for_score(499), ScoreTier::Low);
        assert_eq!(ScoreTier::for_score(500), ScoreTier::Medium);
        assert_eq!(ScoreTier::for_score(1500), ScoreTier::High);
        assert_eq!(ScoreTier::for_score(3000), ScoreTier::Ultra);
        assert_eq!(ScoreTier::for_score(5000), ScoreTier::Legendary);
        assert_eq!(ScoreTier::for_score(u64::MAX), ScoreTier::Legendary);
    }

    #[test]
    fn test_overlapping_obstacle_ends_run() {
        let mut pools = Pools::new(&Tuning::default());
        let mut run = RunState::new(0.08, 0.0);
        run.score = 120;
        let h = pools.obstacles.acquire().unwrap();
        pools.obstacles[h].position = Vec3::new(0.0, 1.0, -0.5);

        let mut events = Vec::new();
        let player = player_at(Vec3::new(0.0, 0.5, 0.0));
        let report = resolve_collisions(&player, &mut pools, &mut run, 10, 3, &mut events);

        assert_eq!(report.fatal, Some(h));
        assert!(run.game_over);
        assert_eq!(run.score, 120);
        assert!(events.contains(&GameEvent::GameOver { final_score: 120 }));
    }

    #[test]
    fn test_separated_obstacle_is_harmless() {
        let mut pools = Pools::new(&Tuning::default());
        let mut run = RunState::new(0.08, 0.0);
        let h = pools.obstacles.acquire().unwrap();
        pools.obstacles[h].position = Vec3::new(3.0, 1.0, 0.0);

        let mut events = Vec::new();
        let player = player_at(Vec3::new(0.0, 0.5, 0.0));
        let report = resolve_collisions(&player, &mut pools, &mut run, 10, 3, &mut events);

        assert_eq!(report.fatal, None);
        assert!(!run.game_over);
        assert!(events.is_empty());
    }

    #[test]
    fn test_coin_scores_once() {
        let mut pools = Pools::new(&Tuning::default());
        let mut run = RunState::new(0.08, 0.0);
        let h = pools.coins.acquire().unwrap();
        pools.coins[h].position = Vec3::new(0.0, 1.2, 0.0);

        let player = player_at(Vec3::new(0.0, 0.5, 0.0));
        let mut events = Vec::new();
        let first = resolve_collisions(&player, &mut pools, &mut run, 10, 3, &mut events);
        assert_eq!(first.coins, 1);
        assert_eq!(run.score, 10);
        assert!(!pools.coins.is_active(h));

        // Same spot again: the coin is back in the pool and must not score
        let second = resolve_collisions(&player, &mut pools, &mut run, 10, 3, &mut events);
        assert_eq!(second.coins, 0);
        assert_eq!(run.score, 10);
        assert!(pools.is_conserved());
    }

    #[test]
    fn test_bonus_coin_worth_triple_and_flags_effect() {
        let mut pools = Pools::new(&Tuning::default());
        let mut run = RunState::new(0.08, 0.0);
        run.score = 480;
        let h = pools.coins.acquire_where(Coin::is_bonus).unwrap();
        assert_eq!(pools.coins[h].kind, CoinKind::Bonus);
        pools.coins[h].position = Vec3::new(0.0, 1.0, 0.0);

        let player = player_at(Vec3::new(0.0, 0.5, 0.0));
        let mut events = Vec::new();
        resolve_collisions(&player, &mut pools, &mut run, 10, 3, &mut events);

        assert_eq!(run.score, 510);
        assert!(events.contains(&GameEvent::ScoreEffect {
            score: 510,
            tier: ScoreTier::Medium,
            bonus: true
        }));
        assert!(events.contains(&GameEvent::TierChanged {
            from: ScoreTier::Low,
            to: ScoreTier::Medium
        }));
    }

    #[test]
    fn test_coin_cue_carries_new_tier() {
        let mut pools = Pools::new(&Tuning::default());
        let mut run = RunState::new(0.08, 0.0);
        run.score = 4995;
        let h = pools.coins.acquire_where(|c| !c.is_bonus()).unwrap();
        pools.coins[h].position = Vec3::new(0.0, 1.0, 0.0);

        let player = player_at(Vec3::new(0.0, 0.5, 0.0));
        let mut events = Vec::new();
        resolve_collisions(&player, &mut pools, &mut run, 10, 3, &mut events);

        assert!(events.contains(&GameEvent::Sound(SoundCue::Coin {
            bonus: false,
            tier: ScoreTier::Legendary
        })));
    }

    #[test]
    fn test_game_over_freezes_coins() {
        let mut pools = Pools::new(&Tuning::default());
        let mut run = RunState::new(0.08, 0.0);
        let o = pools.obstacles.acquire().unwrap();
        pools.obstacles[o].position = Vec3::new(0.0, 1.0, 0.0);
        let c = pools.coins.acquire().unwrap();
        pools.coins[c].position = Vec3::new(0.0, 1.0, 0.0);

        let player = player_at(Vec3::new(0.0, 0.5, 0.0));
        let mut events = Vec::new();
        resolve_collisions(&player, &mut pools, &mut run, 10, 3, &mut events);
        assert!(run.game_over);
        assert_eq!(run.score, 0);
        assert!(pools.coins.is_active(c));
    }
}
