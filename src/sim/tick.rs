//! Simulation driver
//!
//! One call to [`tick`] advances the run by one frame: player motion, speed and
//! difficulty, the track (and through it the spawn planner), collisions, and finally
//! the speed snapshot the music timer reads.

use glam::Vec3;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::collision::{Aabb, CollisionReport, resolve_collisions};
use super::difficulty::{Difficulty, advance_speed};
use super::pool::Pools;
use super::spawn::{SpawnContext, SpawnOutcome, SpawnPlanner};
use super::state::{
    GameEvent, JumpState, Player, RngState, RunState, SoundCue, SpeedSignal, SpeedSnapshot,
};
use super::track::{Track, TrackUpdate};
use crate::consts::*;
use crate::lane_x;
use crate::tuning::Tuning;

/// Intents gathered since the previous tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    pub move_left: bool,
    pub move_right: bool,
    pub jump: bool,
    /// Start over (only honored after game over)
    pub restart: bool,
}

/// Camera target and look-at point, eased toward the player every tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraRig {
    pub position: Vec3,
    pub look_at: Vec3,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 5.0, 10.0),
            look_at: Vec3::new(0.0, PLAYER_GROUND_Y, 0.0),
        }
    }
}

impl CameraRig {
    /// Follow the player along z only; lane changes and jumps don't move the camera
    pub fn follow(&mut self, player_z: f32) {
        let target = Vec3::new(0.0, CAMERA_HEIGHT, player_z + CAMERA_TRAIL);
        self.position = self.position.lerp(target, CAMERA_LERP);
        self.look_at = Vec3::new(0.0, CAMERA_LOOK_HEIGHT, player_z - CAMERA_LOOK_AHEAD);
    }
}

/// What one tick did
#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    pub track: TrackUpdate,
    /// Decisions for segments generated this tick
    pub spawns: Vec<SpawnOutcome>,
    pub collisions: CollisionReport,
}

/// A complete run: state, pools, track, and the RNG everything draws from
#[derive(Debug, Clone)]
pub struct Game {
    pub tuning: Tuning,
    pub run: RunState,
    pub player: Player,
    pub pools: Pools,
    pub track: Track,
    pub planner: SpawnPlanner,
    pub camera: CameraRig,
    rng_state: RngState,
    rng: Pcg32,
    events: Vec<GameEvent>,
    speed_signal: SpeedSignal,
}

impl Game {
    /// Allocate pools and lay down the initial path
    pub fn new(tuning: Tuning, seed: u64, now: f64) -> Self {
        let rng_state = RngState::new(seed);
        let mut game = Self {
            run: RunState::new(tuning.initial_speed, now),
            player: Player::default(),
            pools: Pools::new(&tuning),
            track: Track::new(&tuning),
            planner: SpawnPlanner::new(),
            camera: CameraRig::default(),
            rng: rng_state.to_rng(),
            rng_state,
            events: Vec::new(),
            speed_signal: SpeedSignal::new(),
            tuning,
        };
        game.reset(now);
        game
    }

    pub fn seed(&self) -> u64 {
        self.rng_state.seed
    }

    /// Return everything to the pools and start a fresh run at `now`
    pub fn reset(&mut self, now: f64) {
        self.pools.obstacles.release_all();
        self.pools.coins.release_all();
        self.track.reset(&mut self.pools, &self.tuning);
        self.run = RunState::new(self.tuning.initial_speed, now);
        self.player = Player::default();
        self.planner.reset();
        self.camera = CameraRig::default();
        self.events.clear();
        self.speed_signal.publish(SpeedSnapshot::default());

        self.advance_track(now);
        log::info!(
            "Run reset: {} segments, {} coins placed",
            self.track.len(),
            self.pools.coins.active_len()
        );
    }

    /// Restart after game over; ignored while a run is in progress
    pub fn restart(&mut self, now: f64) -> bool {
        if !self.run.game_over {
            return false;
        }
        self.reset(now);
        true
    }

    /// Re-stamp the run start (the first real interaction restarts the safety clock)
    pub fn mark_run_started(&mut self, now: f64) {
        self.run.run_start = now;
    }

    pub fn move_left(&mut self) {
        if self.run.game_over || self.run.lane == 0 {
            return;
        }
        self.run.lane -= 1;
        self.events.push(GameEvent::Sound(SoundCue::Move));
    }

    pub fn move_right(&mut self) {
        if self.run.game_over || self.run.lane + 1 >= LANES.len() {
            return;
        }
        self.run.lane += 1;
        self.events.push(GameEvent::Sound(SoundCue::Move));
    }

    /// Start a jump; ignored while airborne
    pub fn jump(&mut self) {
        if self.run.game_over || self.run.is_airborne() {
            return;
        }
        self.run.jump = JumpState::Airborne {
            velocity: JUMP_STRENGTH,
        };
        self.events.push(GameEvent::Sound(SoundCue::Jump));
    }

    pub fn score(&self) -> u64 {
        self.run.score
    }

    pub fn is_game_over(&self) -> bool {
        self.run.game_over
    }

    /// Current speed over initial speed
    pub fn speed_ratio(&self) -> f32 {
        if self.tuning.initial_speed > 0.0 {
            self.run.speed / self.tuning.initial_speed
        } else {
            1.0
        }
    }

    /// Playback rate for the runner's skeletal animation
    pub fn animation_time_scale(&self) -> f32 {
        self.speed_ratio()
    }

    /// Handle to the slot the music timer reads
    pub fn speed_signal(&self) -> SpeedSignal {
        self.speed_signal.clone()
    }

    /// Take the events published since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn player_aabb(&self) -> Aabb {
        Aabb::from_center(self.player.position, Vec3::from_array(PLAYER_HALF_EXTENTS))
    }

    fn advance_track(&mut self, now: f64) -> (TrackUpdate, Vec<SpawnOutcome>) {
        let Game {
            tuning,
            run,
            player,
            pools,
            track,
            planner,
            rng,
            ..
        } = self;

        let ctx = SpawnContext {
            elapsed: run.elapsed(now),
            distance: run.distance,
            difficulty: Difficulty::for_distance(run.distance, tuning),
            segment_length: track.segment_length(),
        };
        let mut spawns = Vec::new();
        let update = track.update(player.position.z, pools, tuning, |segment, pools| {
            spawns.push(planner.plan(segment, &ctx, pools, tuning, rng));
        });
        (update, spawns)
    }

    fn move_player(&mut self) {
        let speed = self.run.speed;
        let position = &mut self.player.position;
        position.z -= speed;
        self.run.distance += speed;

        let target_x = lane_x(self.run.lane);
        position.x += (target_x - position.x) * LANE_LERP;

        if let JumpState::Airborne { velocity } = self.run.jump {
            position.y += velocity;
            let velocity = velocity + GRAVITY;
            if position.y <= PLAYER_GROUND_Y {
                position.y = PLAYER_GROUND_Y;
                self.run.jump = JumpState::Grounded;
            } else {
                self.run.jump = JumpState::Airborne { velocity };
            }
        }
    }
}

/// Advance the game by one frame
pub fn tick(game: &mut Game, input: &TickInput, now: f64) -> TickSummary {
    if input.restart {
        game.restart(now);
    }
    if game.run.game_over {
        return TickSummary::default();
    }

    if input.move_left {
        game.move_left();
    }
    if input.move_right {
        game.move_right();
    }
    if input.jump {
        game.jump();
    }

    game.run.ticks += 1;
    game.pools.coins.for_each_active_mut(|coin| coin.spin += COIN_SPIN);

    game.move_player();
    let player_z = game.player.position.z;
    game.camera.follow(player_z);

    // Speed follows difficulty at the new distance
    let difficulty = Difficulty::for_distance(game.run.distance, &game.tuning);
    game.run.speed = advance_speed(game.run.speed, &difficulty, &game.tuning);
    let ratio = game.speed_ratio();
    game.track.set_speed_ratio(ratio, &game.tuning);

    let (track_update, spawns) = game.advance_track(now);

    let player = game.player_aabb();
    let collisions = resolve_collisions(
        &player,
        &mut game.pools,
        &mut game.run,
        difficulty.coin_value,
        game.tuning.bonus_multiplier,
        &mut game.events,
    );

    game.speed_signal.publish(SpeedSnapshot {
        speed_ratio: ratio,
        distance: game.run.distance,
        tick: game.run.ticks,
    });

    TickSummary {
        track: track_update,
        spawns,
        collisions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::spawn::Placement;

    const DT: f64 = 1.0 / TICKS_PER_SECOND;

    fn run_ticks(game: &mut Game, input: &TickInput, start: u64, count: u64) {
        for i in start..start + count {
            tick(game, input, i as f64 * DT);
        }
    }

    #[test]
    fn test_initial_path_has_no_obstacles() {
        for seed in 0..20 {
            let game = Game::new(Tuning::default(), seed, 0.0);
            assert_eq!(game.track.len(), 10);
            assert_eq!(game.pools.obstacles.active_len(), 0);
            assert!(game.pools.is_conserved());
        }
    }

    #[test]
    fn test_same_seed_same_run() {
        let mut a = Game::new(Tuning::default(), 42, 0.0);
        let mut b = Game::new(Tuning::default(), 42, 0.0);
        let input = TickInput::default();
        for i in 0..1500 {
            let now = i as f64 * DT;
            tick(&mut a, &input, now);
            tick(&mut b, &input, now);
        }
        assert_eq!(a.run.distance, b.run.distance);
        assert_eq!(a.score(), b.score());
        assert_eq!(a.is_game_over(), b.is_game_over());
        let pa: Vec<Vec3> = a.pools.obstacles.iter_active().map(|(_, o)| o.position).collect();
        let pb: Vec<Vec3> = b.pools.obstacles.iter_active().map(|(_, o)| o.position).collect();
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_first_segment_after_window_gets_obstacle() {
        let mut game = Game::new(Tuning::default(), 9, 0.0);
        let input = TickInput::default();
        for i in 1..2000u64 {
            let now = i as f64 * DT;
            let summary = tick(&mut game, &input, now);
            let in_window = game.run.elapsed(now) < 3.0 || game.run.distance < 15.0;
            if in_window {
                assert_eq!(game.pools.obstacles.active_len(), 0);
            }
            if let Some(first) = summary.spawns.iter().find(|s| !s.in_safety_window) {
                assert_eq!(first.obstacle_chance, 1.0);
                assert!(matches!(first.placement, Placement::Obstacles { count: 1, .. }));
                return;
            }
        }
        panic!("no segment generated after the safety window");
    }

    #[test]
    fn test_lane_moves_clamp_and_sound_once() {
        let mut game = Game::new(Tuning::default(), 1, 0.0);
        game.move_left();
        game.move_left();
        assert_eq!(game.run.lane, 0);
        let events = game.drain_events();
        assert_eq!(events, vec![GameEvent::Sound(SoundCue::Move)]);

        game.move_right();
        game.move_right();
        game.move_right();
        assert_eq!(game.run.lane, 2);
        assert_eq!(game.drain_events().len(), 2);
    }

    #[test]
    fn test_player_lerps_toward_lane() {
        let mut game = Game::new(Tuning::default(), 1, 0.0);
        game.move_right();
        tick(&mut game, &TickInput::default(), DT);
        assert!((game.player.position.x - 0.3).abs() < 1e-5);
        run_ticks(&mut game, &TickInput::default(), 2, 100);
        assert!((game.player.position.x - 3.0).abs() < 0.01);
    }

    #[test]
    fn test_jump_arc_lands_on_ground() {
        let mut game = Game::new(Tuning::default(), 1, 0.0);
        game.jump();
        game.jump();
        assert_eq!(game.drain_events(), vec![GameEvent::Sound(SoundCue::Jump)]);

        let mut peak: f32 = 0.0;
        for i in 1..200u64 {
            tick(&mut game, &TickInput::default(), i as f64 * DT);
            peak = peak.max(game.player.position.y);
            if !game.run.is_airborne() {
                break;
            }
        }
        assert!(!game.run.is_airborne());
        assert!(peak > 5.0);
        assert_eq!(game.player.position.y, PLAYER_GROUND_Y);
    }

    #[test]
    fn test_collision_ends_run_and_freezes() {
        let mut game = Game::new(Tuning::default(), 3, 0.0);
        let h = game.pools.obstacles.acquire().unwrap();
        game.pools.obstacles[h].position = Vec3::new(0.0, 1.0, -0.5);

        let summary = tick(&mut game, &TickInput::default(), DT);
        assert_eq!(summary.collisions.fatal, Some(h));
        assert!(game.is_game_over());
        let events = game.drain_events();
        assert!(events.contains(&GameEvent::GameOver { final_score: 0 }));

        let distance = game.run.distance;
        run_ticks(&mut game, &TickInput::default(), 2, 30);
        assert_eq!(game.run.distance, distance);

        let input = TickInput {
            move_left: true,
            jump: true,
            ..Default::default()
        };
        tick(&mut game, &input, 0.6);
        assert_eq!(game.run.lane, START_LANE);
        assert!(game.drain_events().is_empty());
    }

    #[test]
    fn test_restart_only_after_game_over() {
        let mut game = Game::new(Tuning::default(), 5, 0.0);
        run_ticks(&mut game, &TickInput::default(), 1, 10);
        assert!(!game.restart(1.0));
        assert_eq!(game.run.ticks, 10);

        game.run.game_over = true;
        let input = TickInput {
            restart: true,
            ..Default::default()
        };
        tick(&mut game, &input, 20.0);
        assert!(!game.is_game_over());
        assert_eq!(game.run.run_start, 20.0);
        assert_eq!(game.run.ticks, 1);
        assert!(game.pools.is_conserved());
    }

    #[test]
    fn test_speed_signal_tracks_ticks() {
        let mut game = Game::new(Tuning::default(), 2, 0.0);
        let signal = game.speed_signal();
        run_ticks(&mut game, &TickInput::default(), 1, 25);
        let snapshot = signal.read();
        assert_eq!(snapshot.tick, 25);
        assert!(snapshot.speed_ratio > 1.0);
        assert_eq!(snapshot.distance, game.run.distance);
        assert_eq!(game.animation_time_scale(), snapshot.speed_ratio);

        game.reset(5.0);
        assert_eq!(signal.read(), SpeedSnapshot::default());
    }

    #[test]
    fn test_mark_run_started_restarts_safety_clock() {
        let mut game = Game::new(Tuning::default(), 4, 0.0);
        game.mark_run_started(10.0);
        assert_eq!(game.run.elapsed(11.0), 1.0);
    }

    #[test]
    fn test_camera_follows_z_only() {
        let mut game = Game::new(Tuning::default(), 6, 0.0);
        game.move_left();
        game.jump();
        run_ticks(&mut game, &TickInput::default(), 1, 120);
        assert_eq!(game.camera.position.x, 0.0);
        assert_eq!(game.camera.look_at.y, CAMERA_LOOK_HEIGHT);
        assert!(game.camera.position.z > game.player.position.z);
    }

    #[test]
    fn test_pools_conserved_over_long_run() {
        let mut game = Game::new(Tuning::default(), 77, 0.0);
        let mut now = 0.0;
        for i in 0..20_000u64 {
            now += DT;
            let input = TickInput {
                jump: i % 40 == 0,
                move_left: i % 90 == 0,
                move_right: i % 90 == 45,
                restart: true,
            };
            tick(&mut game, &input, now);
            assert!(game.pools.is_conserved());
            assert_eq!(game.track.len(), game.tuning.target_segments);
        }
    }
}
