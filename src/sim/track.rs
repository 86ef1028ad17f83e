//! Track generator
//!
//! Keeps a moving active path of segments around the player. Segments are placed at
//! the frontier and the frontier advances toward -z by the current segment length.
//! Segments that fall far enough behind the player go back to the pool along with
//! whatever collectibles are still inside them.

use std::collections::VecDeque;

use super::pool::{Handle, Pools, Segment};
use crate::ease_out_quad;
use crate::tuning::Tuning;

/// Segment length for a speed ratio: ratio clamped to `[1, max_length_speed_ratio]`,
/// eased out into `[base, max]` and rounded to whole units
pub fn segment_length(speed_ratio: f32, tuning: &Tuning) -> f32 {
    let ratio = if speed_ratio.is_finite() { speed_ratio } else { 1.0 };
    let max_ratio = tuning.max_length_speed_ratio;
    let t = if max_ratio > 1.0 {
        (ratio.clamp(1.0, max_ratio) - 1.0) / (max_ratio - 1.0)
    } else {
        0.0
    };
    let base = tuning.base_segment_length;
    let max = tuning.max_segment_length.max(base);
    (base + (max - base) * ease_out_quad(t)).round()
}

/// Counts from one track update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackUpdate {
    pub recycled: usize,
    pub generated: usize,
}

/// The active path and the frontier where the next segment goes
#[derive(Debug, Clone)]
pub struct Track {
    /// Active segments from nearest-behind to farthest-ahead
    path: VecDeque<Handle>,
    frontier_z: f32,
    segment_length: f32,
}

impl Track {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            path: VecDeque::with_capacity(tuning.target_segments),
            frontier_z: 0.0,
            segment_length: tuning.base_segment_length,
        }
    }

    /// Length every segment is scaled to this tick
    pub fn segment_length(&self) -> f32 {
        self.segment_length
    }

    pub fn frontier_z(&self) -> f32 {
        self.frontier_z
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Active segment handles, rear first
    pub fn path(&self) -> impl Iterator<Item = Handle> + '_ {
        self.path.iter().copied()
    }

    /// Recompute the segment length for this tick; logs when the rounded length changes
    pub fn set_speed_ratio(&mut self, speed_ratio: f32, tuning: &Tuning) -> f32 {
        let length = segment_length(speed_ratio, tuning);
        if length != self.segment_length {
            log::info!(
                "Segment length {} -> {} (speed ratio {:.2}x)",
                self.segment_length,
                length,
                speed_ratio
            );
            self.segment_length = length;
        }
        length
    }

    /// Return every segment to the pool and move the frontier back to the origin
    pub fn reset(&mut self, pools: &mut Pools, tuning: &Tuning) {
        for handle in self.path.drain(..) {
            pools.segments.release(handle);
        }
        self.frontier_z = 0.0;
        self.segment_length = tuning.base_segment_length;
    }

    /// Recycle segments behind `player_z`, rescale the survivors, then generate up to the
    /// target count. `on_new` runs once for every freshly placed segment.
    pub fn update(
        &mut self,
        player_z: f32,
        pools: &mut Pools,
        tuning: &Tuning,
        mut on_new: impl FnMut(&Segment, &mut Pools),
    ) -> TrackUpdate {
        let mut update = TrackUpdate::default();
        let length = self.segment_length;
        let recycle_distance = length * tuning.recycle_factor;

        // Recycle from the rear
        let mut kept = VecDeque::with_capacity(self.path.len());
        for handle in self.path.drain(..) {
            let segment = &pools.segments[handle];
            if segment.position.z - player_z > recycle_distance {
                let segment = segment.clone();
                pools.clear_span(&segment);
                pools.segments.release(handle);
                update.recycled += 1;
            } else {
                kept.push_back(handle);
            }
        }
        self.path = kept;

        for handle in &self.path {
            pools.segments[*handle].length = length;
        }

        while self.path.len() < tuning.target_segments && pools.segments.free_len() > 0 {
            let Some(handle) = pools.segments.acquire() else {
                break;
            };
            let segment = &mut pools.segments[handle];
            segment.position.z = self.frontier_z;
            segment.length = length;
            let placed = segment.clone();
            self.path.push_back(handle);
            self.frontier_z -= length;
            update.generated += 1;

            on_new(&placed, pools);
        }

        if self.path.len() < tuning.target_segments {
            log::debug!(
                "track short: {} of {} segments active",
                self.path.len(),
                tuning.target_segments
            );
        }

        update
    }
}
