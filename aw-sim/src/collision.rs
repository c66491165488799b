use bevy::math::DVec3;

use crate::aabb::{Aabb, BodySize, cell_range};
use crate::grid::VoxelGrid;

/// Extra solid volumes a movement system should collide against.
pub trait CollisionProvider {
    /// Appends every solid box that may touch `query`.
    fn collect_boxes(&self, query: &Aabb, out: &mut Vec<Aabb>);

    fn collides(&self, query: &Aabb) -> bool {
        let mut boxes = Vec::new();
        self.collect_boxes(query, &mut boxes);
        boxes.iter().any(|block| query.intersects(block))
    }
}

impl CollisionProvider for VoxelGrid {
    fn collect_boxes(&self, query: &Aabb, out: &mut Vec<Aabb>) {
        let local_min = self.to_local(query.min);
        let local_max = self.to_local(query.max);
        let (min_x, max_x) = cell_range(local_min.x, local_max.x);
        let (min_y, max_y) = cell_range(local_min.y, local_max.y);
        let (min_z, max_z) = cell_range(local_min.z, local_max.z);

        let min_x = min_x.saturating_sub(1).max(0);
        let min_y = min_y.saturating_sub(1).max(0);
        let min_z = min_z.saturating_sub(1).max(0);
        let max_x = max_x.saturating_add(1).min(self.width() - 1);
        let max_y = max_y.saturating_add(1).min(self.height() - 1);
        let max_z = max_z.saturating_add(1).min(self.depth() - 1);

        for y in min_y..=max_y {
            for z in min_z..=max_z {
                for x in min_x..=max_x {
                    if self.is_solid(x, y, z) {
                        out.push(self.cell_box(x, y, z));
                    }
                }
            }
        }
    }
}

/// Collision view over an optional barrier, for movement code that may run
/// before any barrier is known.
#[derive(Clone, Copy)]
pub struct BarrierCollision<'a> {
    grid: Option<&'a VoxelGrid>,
}

impl<'a> BarrierCollision<'a> {
    pub fn empty() -> Self {
        Self { grid: None }
    }

    pub fn with_grid(grid: &'a VoxelGrid) -> Self {
        Self { grid: Some(grid) }
    }

    pub fn from_option(grid: Option<&'a VoxelGrid>) -> Self {
        Self { grid }
    }

    /// Moves a body by `motion`, clipping Y, then X, then Z against the
    /// barrier cells. Returns the new feet position and the velocity with
    /// blocked components zeroed.
    pub fn move_body(&self, pos: DVec3, motion: DVec3, size: BodySize) -> (DVec3, DVec3) {
        let mut bb = Aabb::around_feet(pos, size);
        let mut boxes = Vec::new();
        self.collect_boxes(&bb.expanded_by_motion(motion), &mut boxes);

        let mut y = motion.y;
        for block in &boxes {
            y = bb.clip_y(block, y);
        }
        bb = bb.offset(DVec3::new(0.0, y, 0.0));

        let mut x = motion.x;
        for block in &boxes {
            x = bb.clip_x(block, x);
        }
        bb = bb.offset(DVec3::new(x, 0.0, 0.0));

        let mut z = motion.z;
        for block in &boxes {
            z = bb.clip_z(block, z);
        }
        bb = bb.offset(DVec3::new(0.0, 0.0, z));

        let vel = DVec3::new(
            if x != motion.x { 0.0 } else { x },
            if y != motion.y { 0.0 } else { y },
            if z != motion.z { 0.0 } else { z },
        );
        (bb.feet_position(), vel)
    }
}

impl CollisionProvider for BarrierCollision<'_> {
    fn collect_boxes(&self, query: &Aabb, out: &mut Vec<Aabb>) {
        if let Some(grid) = self.grid {
            grid.collect_boxes(query, out);
        }
    }
}
