//! Fixed-capacity entity pools
//!
//! Every segment, obstacle and coin is allocated once at startup into an arena of
//! slots. A slot is either on the free list or on the active list, never both, so
//! `active + free == capacity` holds after every operation.

use std::fmt;
use std::ops::{Index, IndexMut};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::collision::Aabb;
use crate::consts::COIN_HALF_EXTENTS;
use crate::error::{Result, RunnerError};
use crate::tuning::Tuning;

/// The three pooled entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Segment,
    Obstacle,
    Coin,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Segment => "segment",
            EntityKind::Obstacle => "obstacle",
            EntityKind::Coin => "coin",
        })
    }
}

/// Index of a slot in one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(u32);

impl Handle {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An entity that can live in a [`Pool`]
pub trait Poolable {
    const KIND: EntityKind;

    /// Called when the slot leaves the free list
    fn activate(&mut self);

    /// Called when the slot returns to the free list; strips transient placement state
    fn recycle(&mut self);
}

#[derive(Debug, Clone)]
struct Slot<T> {
    item: T,
    active: bool,
}

/// Fixed-capacity pool with free and active index lists
#[derive(Debug, Clone)]
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<Handle>,
    /// Active handles in activation order
    active: Vec<Handle>,
}

impl<T: Poolable> Pool<T> {
    /// Build a pool of `capacity` inactive entities
    pub fn from_fn(capacity: usize, mut make: impl FnMut(usize) -> T) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        for i in 0..capacity {
            let mut item = make(i);
            item.recycle();
            slots.push(Slot {
                item,
                active: false,
            });
        }
        // Reverse so the first slot is popped first
        let free = (0..capacity as u32).rev().map(Handle).collect();
        Self {
            slots,
            free,
            active: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    /// Active handles in activation order
    pub fn active(&self) -> &[Handle] {
        &self.active
    }

    pub fn is_active(&self, handle: Handle) -> bool {
        self.slots
            .get(handle.index())
            .is_some_and(|slot| slot.active)
    }

    /// Take one inactive entity, or report exhaustion
    pub fn try_acquire(&mut self) -> Result<Handle> {
        let handle = self
            .free
            .pop()
            .ok_or(RunnerError::PoolExhausted { kind: T::KIND })?;
        self.activate_slot(handle);
        Ok(handle)
    }

    /// Take one inactive entity; exhaustion is logged and the spawn skipped
    pub fn acquire(&mut self) -> Option<Handle> {
        match self.try_acquire() {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("{e}: {} active, spawn skipped", self.active.len());
                None
            }
        }
    }

    /// Take one inactive entity matching `pred` (e.g. the bonus-flagged coins)
    pub fn acquire_where(&mut self, pred: impl Fn(&T) -> bool) -> Option<Handle> {
        let pos = self
            .free
            .iter()
            .rposition(|h| pred(&self.slots[h.index()].item))?;
        let handle = self.free.remove(pos);
        self.activate_slot(handle);
        Some(handle)
    }

    /// Number of inactive entities matching `pred`
    pub fn free_count_where(&self, pred: impl Fn(&T) -> bool) -> usize {
        self.free
            .iter()
            .filter(|h| pred(&self.slots[h.index()].item))
            .count()
    }

    /// Return an entity to the pool. Returns false (and does nothing) if it was
    /// already free.
    pub fn release(&mut self, handle: Handle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index()) else {
            return false;
        };
        if !slot.active {
            log::debug!("ignoring double release of {} {}", T::KIND, handle.index());
            return false;
        }
        slot.active = false;
        slot.item.recycle();
        if let Some(pos) = self.active.iter().position(|h| *h == handle) {
            self.active.remove(pos);
        }
        self.free.push(handle);
        true
    }

    /// Release every active entity matching `pred`; returns how many were released
    pub fn release_where(&mut self, pred: impl Fn(&T) -> bool) -> usize {
        let doomed: Vec<Handle> = self
            .active
            .iter()
            .copied()
            .filter(|h| pred(&self.slots[h.index()].item))
            .collect();
        for handle in &doomed {
            self.release(*handle);
        }
        doomed.len()
    }

    /// Release everything
    pub fn release_all(&mut self) {
        while let Some(handle) = self.active.last().copied() {
            self.release(handle);
        }
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots.get(handle.index()).map(|slot| &slot.item)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slots.get_mut(handle.index()).map(|slot| &mut slot.item)
    }

    /// Iterate active entities in activation order
    pub fn iter_active(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.active.iter().map(|h| (*h, &self.slots[h.index()].item))
    }

    /// Iterate every slot, active or not (used to mirror the pool into a scene)
    pub fn iter_all(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (Handle(i as u32), &slot.item))
    }

    /// Apply `f` to every active entity
    pub fn for_each_active_mut(&mut self, mut f: impl FnMut(&mut T)) {
        for handle in &self.active {
            f(&mut self.slots[handle.index()].item);
        }
    }

    /// `active + free == capacity` and no handle is on both lists
    pub fn is_conserved(&self) -> bool {
        if self.active.len() + self.free.len() != self.slots.len() {
            return false;
        }
        let active_ok = self.active.iter().all(|h| self.slots[h.index()].active);
        let free_ok = self.free.iter().all(|h| !self.slots[h.index()].active);
        active_ok && free_ok
    }

    fn activate_slot(&mut self, handle: Handle) {
        let slot = &mut self.slots[handle.index()];
        slot.active = true;
        slot.item.activate();
        self.active.push(handle);
    }
}

impl<T> Index<Handle> for Pool<T> {
    type Output = T;

    fn index(&self, handle: Handle) -> &T {
        &self.slots[handle.index()].item
    }
}

impl<T> IndexMut<Handle> for Pool<T> {
    fn index_mut(&mut self, handle: Handle) -> &mut T {
        &mut self.slots[handle.index()].item
    }
}

/// One unit of track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: u32,
    /// Near edge of the segment; it extends toward -z by `length`
    pub position: Vec3,
    pub length: f32,
    pub visible: bool,
}

impl Segment {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            position: Vec3::ZERO,
            length: 0.0,
            visible: false,
        }
    }

    /// Whether `z` lies strictly inside this segment's span
    pub fn spans(&self, z: f32) -> bool {
        z < self.position.z && z > self.position.z - self.length
    }
}

impl Poolable for Segment {
    const KIND: EntityKind = EntityKind::Segment;

    fn activate(&mut self) {
        self.visible = true;
    }

    fn recycle(&mut self) {
        self.visible = false;
        self.position = Vec3::ZERO;
    }
}

/// Obstacle shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ObstacleKind {
    /// Tall box blocking one lane
    #[default]
    Single,
    /// Wide box blocking two lanes
    Double,
    /// Low plank across all lanes; must be jumped
    Triple,
    /// Tall thin wall
    Wall,
    /// Low box that can be jumped
    LowBarrier,
}

impl ObstacleKind {
    /// Collision box half extents
    pub fn half_extents(self) -> Vec3 {
        match self {
            ObstacleKind::Single => Vec3::new(0.75, 1.0, 0.75),
            ObstacleKind::Double => Vec3::new(2.25, 1.0, 0.75),
            ObstacleKind::Triple => Vec3::new(4.0, 0.4, 0.75),
            ObstacleKind::Wall => Vec3::new(1.0, 1.5, 0.5),
            ObstacleKind::LowBarrier => Vec3::new(1.0, 0.5, 1.0),
        }
    }

    /// Height of the box center so it rests on the ground
    pub fn rest_height(self) -> f32 {
        self.half_extents().y
    }
}

/// An obstacle entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: u32,
    pub kind: ObstacleKind,
    pub position: Vec3,
    pub visible: bool,
    /// Idle rotation (radians), cosmetic
    pub spin: f32,
}

impl Obstacle {
    pub fn new(id: u32, kind: ObstacleKind) -> Self {
        Self {
            id,
            kind,
            position: Vec3::ZERO,
            visible: false,
            spin: 0.0,
        }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_center(self.position, self.kind.half_extents())
    }
}

impl Poolable for Obstacle {
    const KIND: EntityKind = EntityKind::Obstacle;

    fn activate(&mut self) {
        self.visible = true;
    }

    fn recycle(&mut self) {
        self.visible = false;
        self.position = Vec3::ZERO;
        self.spin = 0.0;
    }
}

/// Coin flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoinKind {
    #[default]
    Normal,
    Bonus,
}

/// A coin entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coin {
    pub id: u32,
    pub kind: CoinKind,
    pub position: Vec3,
    pub visible: bool,
    pub spin: f32,
}

impl Coin {
    pub fn new(id: u32, kind: CoinKind) -> Self {
        Self {
            id,
            kind,
            position: Vec3::ZERO,
            visible: false,
            spin: 0.0,
        }
    }

    pub fn is_bonus(&self) -> bool {
        self.kind == CoinKind::Bonus
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_center(self.position, Vec3::from_array(COIN_HALF_EXTENTS))
    }
}

impl Poolable for Coin {
    const KIND: EntityKind = EntityKind::Coin;

    fn activate(&mut self) {
        self.visible = true;
    }

    fn recycle(&mut self) {
        self.visible = false;
        self.position = Vec3::ZERO;
        self.spin = 0.0;
    }
}

/// The three pools, sized from tuning
#[derive(Debug, Clone)]
pub struct Pools {
    pub segments: Pool<Segment>,
    pub obstacles: Pool<Obstacle>,
    pub coins: Pool<Coin>,
}

impl Pools {
    pub fn new(tuning: &Tuning) -> Self {
        let mix = &tuning.obstacle_mix;
        let first_bonus = tuning.first_bonus_coin();
        let pools = Self {
            segments: Pool::from_fn(tuning.segment_pool, |i| Segment::new(i as u32)),
            obstacles: Pool::from_fn(mix.total(), |i| Obstacle::new(i as u32, mix.kind_for_slot(i))),
            coins: Pool::from_fn(tuning.coin_pool, |i| {
                let kind = if i >= first_bonus {
                    CoinKind::Bonus
                } else {
                    CoinKind::Normal
                };
                Coin::new(i as u32, kind)
            }),
        };
        log::info!(
            "Pools ready: {} segments, {} obstacles, {} coins ({} bonus)",
            pools.segments.capacity(),
            pools.obstacles.capacity(),
            pools.coins.capacity(),
            tuning.coin_pool - first_bonus,
        );
        pools
    }

    /// Release every obstacle and coin whose z lies inside `segment`'s span
    pub fn clear_span(&mut self, segment: &Segment) -> usize {
        let obstacles = self.obstacles.release_where(|o| segment.spans(o.position.z));
        let coins = self.coins.release_where(|c| segment.spans(c.position.z));
        obstacles + coins
    }

    pub fn is_conserved(&self) -> bool {
        self.segments.is_conserved() && self.obstacles.is_conserved() && self.coins.is_conserved()
    }
}
