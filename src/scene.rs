//! Rendering-backend interface
//!
//! The simulation never talks to a renderer directly. [`SceneBinding`] creates one
//! backend entity per pool slot up front and, each frame, copies positions and
//! visibility from the pools into the backend. Hidden slots stay allocated.

use glam::Vec3;

use crate::consts::{COIN_HALF_EXTENTS, PLAYER_HALF_EXTENTS};
use crate::sim::collision::Aabb;
use crate::sim::pool::{CoinKind, Handle, ObstacleKind, Pool, Poolable, Segment};
use crate::sim::tick::Game;
use crate::tuning::Tuning;

/// Backend-side entity id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneHandle(pub u32);

/// What an entity represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneKind {
    Player,
    Segment,
    Obstacle,
    Coin,
}

/// Mesh description handed to the backend at creation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry {
    Box { half_extents: Vec3 },
    /// Flat track piece, `length` along z
    Plane { width: f32, length: f32 },
    /// Coin disc facing the player
    Disc { radius: f32, thickness: f32 },
}

impl Geometry {
    /// Half extents at unit scale
    pub fn half_extents(&self) -> Vec3 {
        match *self {
            Geometry::Box { half_extents } => half_extents,
            Geometry::Plane { width, length } => Vec3::new(width * 0.5, 0.05, length * 0.5),
            Geometry::Disc { radius, thickness } => Vec3::new(radius, radius, thickness * 0.5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Material {
    Player,
    Track,
    Obstacle(ObstacleKind),
    Coin(CoinKind),
}

/// The rendering backend
pub trait SceneBackend {
    fn create_entity(&mut self, kind: SceneKind, geometry: Geometry, material: Material) -> SceneHandle;

    fn set_position(&mut self, handle: SceneHandle, position: Vec3);

    fn set_visible(&mut self, handle: SceneHandle, visible: bool);

    fn set_scale(&mut self, handle: SceneHandle, scale: Vec3);

    /// World-space bounds; `None` for an unknown handle
    fn bounding_box(&self, handle: SceneHandle) -> Option<Aabb>;

    fn advance_camera(&mut self, position: Vec3, look_at: Vec3);
}

/// An entity as the headless backend stores it
#[derive(Debug, Clone, PartialEq)]
pub struct SceneEntity {
    pub kind: SceneKind,
    pub geometry: Geometry,
    pub material: Material,
    pub position: Vec3,
    pub scale: Vec3,
    pub visible: bool,
}

/// Backend that keeps the scene in memory
#[derive(Debug, Clone, Default)]
pub struct HeadlessScene {
    pub entities: Vec<SceneEntity>,
    pub camera_position: Vec3,
    pub camera_look_at: Vec3,
    pub camera_moves: u64,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(&self, handle: SceneHandle) -> Option<&SceneEntity> {
        self.entities.get(handle.0 as usize)
    }

    pub fn visible_count(&self, kind: SceneKind) -> usize {
        self.entities
            .iter()
            .filter(|e| e.kind == kind && e.visible)
            .count()
    }
}

impl SceneBackend for HeadlessScene {
    fn create_entity(&mut self, kind: SceneKind, geometry: Geometry, material: Material) -> SceneHandle {
        let handle = SceneHandle(self.entities.len() as u32);
        self.entities.push(SceneEntity {
            kind,
            geometry,
            material,
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            visible: false,
        });
        handle
    }

    fn set_position(&mut self, handle: SceneHandle, position: Vec3) {
        if let Some(entity) = self.entities.get_mut(handle.0 as usize) {
            entity.position = position;
        }
    }

    fn set_visible(&mut self, handle: SceneHandle, visible: bool) {
        if let Some(entity) = self.entities.get_mut(handle.0 as usize) {
            entity.visible = visible;
        }
    }

    fn set_scale(&mut self, handle: SceneHandle, scale: Vec3) {
        if let Some(entity) = self.entities.get_mut(handle.0 as usize) {
            entity.scale = scale;
        }
    }

    fn bounding_box(&self, handle: SceneHandle) -> Option<Aabb> {
        self.entity(handle)
            .map(|e| Aabb::from_center(e.position, e.geometry.half_extents() * e.scale))
    }

    fn advance_camera(&mut self, position: Vec3, look_at: Vec3) {
        self.camera_position = position;
        self.camera_look_at = look_at;
        self.camera_moves += 1;
    }
}

/// Pool slot to backend entity mapping
#[derive(Debug, Clone)]
pub struct SceneBinding {
    player: SceneHandle,
    segments: Vec<SceneHandle>,
    obstacles: Vec<SceneHandle>,
    coins: Vec<SceneHandle>,
    max_segment_length: f32,
}

impl SceneBinding {
    /// Create every entity the run can ever show; all start hidden except the player
    pub fn new<B: SceneBackend>(backend: &mut B, game: &Game) -> Self {
        let tuning: &Tuning = &game.tuning;
        let pools = &game.pools;

        let player = backend.create_entity(
            SceneKind::Player,
            Geometry::Box {
                half_extents: Vec3::from_array(PLAYER_HALF_EXTENTS),
            },
            Material::Player,
        );
        backend.set_visible(player, true);

        let segments = pools
            .segments
            .iter_all()
            .map(|_| {
                backend.create_entity(
                    SceneKind::Segment,
                    Geometry::Plane {
                        width: tuning.segment_width,
                        length: tuning.max_segment_length,
                    },
                    Material::Track,
                )
            })
            .collect();
        let obstacles = pools
            .obstacles
            .iter_all()
            .map(|(_, obstacle)| {
                backend.create_entity(
                    SceneKind::Obstacle,
                    Geometry::Box {
                        half_extents: obstacle.kind.half_extents(),
                    },
                    Material::Obstacle(obstacle.kind),
                )
            })
            .collect();
        let coins = pools
            .coins
            .iter_all()
            .map(|(_, coin)| {
                backend.create_entity(
                    SceneKind::Coin,
                    Geometry::Disc {
                        radius: COIN_HALF_EXTENTS[0],
                        thickness: COIN_HALF_EXTENTS[2] * 2.0,
                    },
                    Material::Coin(coin.kind),
                )
            })
            .collect();

        Self {
            player,
            segments,
            obstacles,
            coins,
            max_segment_length: tuning.max_segment_length,
        }
    }

    pub fn player(&self) -> SceneHandle {
        self.player
    }

    pub fn segment(&self, handle: Handle) -> Option<SceneHandle> {
        self.segments.get(handle.index()).copied()
    }

    pub fn obstacle(&self, handle: Handle) -> Option<SceneHandle> {
        self.obstacles.get(handle.index()).copied()
    }

    pub fn coin(&self, handle: Handle) -> Option<SceneHandle> {
        self.coins.get(handle.index()).copied()
    }

    /// Mirror the game into the backend; call once per frame after the tick
    pub fn sync<B: SceneBackend>(&self, backend: &mut B, game: &Game) {
        backend.set_position(self.player, game.player.position);

        for (handle, segment) in game.pools.segments.iter_all() {
            let Some(entity) = self.segment(handle) else {
                continue;
            };
            backend.set_visible(entity, segment.visible);
            if segment.visible {
                backend.set_position(entity, segment_center(segment));
                backend.set_scale(entity, Vec3::new(1.0, 1.0, self.segment_scale(segment)));
            }
        }

        mirror(backend, &game.pools.obstacles, &self.obstacles, |o| (o.visible, o.position));
        mirror(backend, &game.pools.coins, &self.coins, |c| (c.visible, c.position));

        backend.advance_camera(game.camera.position, game.camera.look_at);
    }

    fn segment_scale(&self, segment: &Segment) -> f32 {
        if self.max_segment_length > 0.0 {
            segment.length / self.max_segment_length
        } else {
            1.0
        }
    }
}

/// Segments are anchored at their near edge; the mesh is centered
fn segment_center(segment: &Segment) -> Vec3 {
    segment.position - Vec3::new(0.0, 0.0, segment.length * 0.5)
}

fn mirror<B: SceneBackend, T: Poolable>(
    backend: &mut B,
    pool: &Pool<T>,
    entities: &[SceneHandle],
    state: impl Fn(&T) -> (bool, Vec3),
) {
    for ((_, item), entity) in pool.iter_all().zip(entities) {
        let (visible, position) = state(item);
        backend.set_visible(*entity, visible);
        if visible {
            backend.set_position(*entity, position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::tick::{TickInput, tick};

    fn bound_game() -> (Game, HeadlessScene, SceneBinding) {
        let game = Game::new(Tuning::default(), 42, 0.0);
        let mut scene = HeadlessScene::new();
        let binding = SceneBinding::new(&mut scene, &game);
        (game, scene, binding)
    }

    #[test]
    fn test_one_entity_per_slot() {
        let (game, scene, _) = bound_game();
        let pools = &game.pools;
        let expected = 1 + pools.segments.capacity() + pools.obstacles.capacity() + pools.coins.capacity();
        assert_eq!(scene.entities.len(), expected);
        assert_eq!(scene.visible_count(SceneKind::Segment), 0);
    }

    #[test]
    fn test_sync_mirrors_active_entities() {
        let (game, mut scene, binding) = bound_game();
        binding.sync(&mut scene, &game);

        assert_eq!(scene.visible_count(SceneKind::Segment), game.pools.segments.active_len());
        assert_eq!(scene.visible_count(SceneKind::Coin), game.pools.coins.active_len());
        assert_eq!(scene.visible_count(SceneKind::Obstacle), game.pools.obstacles.active_len());
        assert_eq!(scene.camera_moves, 1);
    }

    #[test]
    fn test_segment_scale_and_center() {
        let (game, mut scene, binding) = bound_game();
        binding.sync(&mut scene, &game);

        let (handle, segment) = game.pools.segments.iter_active().next().unwrap();
        let entity = scene.entity(binding.segment(handle).unwrap()).unwrap();
        assert!((entity.scale.z - segment.length / game.tuning.max_segment_length).abs() < 1e-6);
        assert!((entity.position.z - (segment.position.z - segment.length * 0.5)).abs() < 1e-6);

        // Rendered span matches the logical span
        let bounds = scene.bounding_box(binding.segment(handle).unwrap()).unwrap();
        assert!((bounds.max.z - segment.position.z).abs() < 1e-4);
        assert!((bounds.min.z - (segment.position.z - segment.length)).abs() < 1e-4);
    }

    #[test]
    fn test_coin_bounds_match_collision_box() {
        let (game, mut scene, binding) = bound_game();
        binding.sync(&mut scene, &game);

        let (handle, coin) = game.pools.coins.iter_active().next().unwrap();
        let bounds = scene.bounding_box(binding.coin(handle).unwrap()).unwrap();
        let logical = coin.aabb();
        assert!((bounds.min - logical.min).length() < 1e-5);
        assert!((bounds.max - logical.max).length() < 1e-5);
    }

    #[test]
    fn test_released_entities_hide() {
        let (mut game, mut scene, binding) = bound_game();
        binding.sync(&mut scene, &game);
        assert!(scene.visible_count(SceneKind::Coin) > 0);

        game.pools.coins.release_all();
        binding.sync(&mut scene, &game);
        assert_eq!(scene.visible_count(SceneKind::Coin), 0);
    }

    #[test]
    fn test_player_and_camera_follow() {
        let (mut game, mut scene, binding) = bound_game();
        for _ in 0..30 {
            tick(&mut game, &TickInput::default(), 0.0);
        }
        binding.sync(&mut scene, &game);

        let player = scene.entity(binding.player()).unwrap();
        assert!(player.visible);
        assert_eq!(player.position, game.player.position);
        assert_eq!(scene.camera_position, game.camera.position);
        assert_eq!(scene.camera_look_at, game.camera.look_at);
    }

    #[test]
    fn test_unknown_handle_has_no_bounds() {
        let scene = HeadlessScene::new();
        assert!(scene.bounding_box(SceneHandle(7)).is_none());
    }
}
