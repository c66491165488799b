use bevy::math::{DVec3, IVec3};

use crate::face::{Axis, Direction};
use crate::grid::VoxelGrid;
use crate::intercept::AxisWalk;

pub const DEFAULT_REACH: f64 = 10.0;

const EYE_NUDGE: f64 = 0.01;
const MAX_PICK_STEPS: u32 = 256;

/// A solid world block hit by a terrain raycast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockHit {
    pub block: IVec3,
    pub face: Direction,
    pub distance: f64,
}

/// The world outside the barriers, as far as occlusion is concerned.
pub trait TerrainRaycast {
    fn raycast(&self, origin: DVec3, dir: DVec3, max_distance: f64) -> Option<BlockHit>;
}

/// Nothing occludes.
pub struct NoTerrain;

impl TerrainRaycast for NoTerrain {
    fn raycast(&self, _origin: DVec3, _dir: DVec3, _max_distance: f64) -> Option<BlockHit> {
        None
    }
}

/// Solid ground filling every block below `surface_y`.
#[derive(Debug, Clone, Copy)]
pub struct FlatGround {
    pub surface_y: i32,
}

impl TerrainRaycast for FlatGround {
    fn raycast(&self, origin: DVec3, dir: DVec3, max_distance: f64) -> Option<BlockHit> {
        let top = f64::from(self.surface_y);
        if origin.y < top {
            let block = origin.floor();
            return Some(BlockHit {
                block: IVec3::new(block.x as i32, block.y as i32, block.z as i32),
                face: Direction::Up,
                distance: 0.0,
            });
        }
        if dir.y >= 0.0 {
            return None;
        }
        let t = (top - origin.y) / dir.y;
        if t > max_distance {
            return None;
        }
        let p = origin + dir * t;
        Some(BlockHit {
            block: IVec3::new(p.x.floor() as i32, self.surface_y - 1, p.z.floor() as i32),
            face: Direction::Up,
            distance: t,
        })
    }
}

/// A solid barrier cell picked by the editing ray, in local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellHit {
    pub cell: IVec3,
    pub face: Direction,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditTarget {
    Cell(CellHit),
    /// Terrain was hit first; edits fall back to that block.
    Block(BlockHit),
    Nothing,
}

impl EditTarget {
    /// Local cell a place action fills: the neighbour in front of the hit face.
    pub fn placement(&self, grid: &VoxelGrid) -> Option<IVec3> {
        match self {
            EditTarget::Cell(hit) => Some(hit.cell + hit.face.offset()),
            EditTarget::Block(hit) => Some(grid.block_to_local(hit.block + hit.face.offset())),
            EditTarget::Nothing => None,
        }
    }

    /// Local cell a break action clears.
    pub fn removal(&self) -> Option<IVec3> {
        match self {
            EditTarget::Cell(hit) => Some(hit.cell),
            _ => None,
        }
    }
}

/// Resolves what an editor looking along `look` from `eye` is aiming at.
///
/// Barrier cells behind terrain are not pickable. When the barrier walk finds
/// nothing but the terrain block itself sits on a solid barrier cell, that
/// cell is picked with the terrain face.
pub fn pick_cell<T: TerrainRaycast + ?Sized>(
    grid: &VoxelGrid,
    eye: DVec3,
    look: DVec3,
    reach: f64,
    terrain: &T,
) -> EditTarget {
    let dir = look.normalize_or_zero();
    if dir == DVec3::ZERO || !eye.is_finite() || reach <= 0.0 {
        return EditTarget::Nothing;
    }

    let block_hit = terrain.raycast(eye, dir, reach);
    let limit = block_hit.map_or(reach, |hit| hit.distance.min(reach));

    if let Some(mut hit) = march_cells(grid, eye + dir * EYE_NUDGE, dir, limit - EYE_NUDGE) {
        hit.distance += EYE_NUDGE;
        return EditTarget::Cell(hit);
    }

    match block_hit {
        Some(block) => {
            let local = grid.block_to_local(block.block);
            if grid.is_solid(local.x, local.y, local.z) {
                EditTarget::Cell(CellHit {
                    cell: local,
                    face: block.face,
                    distance: block.distance,
                })
            } else {
                EditTarget::Block(block)
            }
        }
        None => EditTarget::Nothing,
    }
}

/// 3D DDA from `origin` up to `limit` along the unit vector `dir`. The
/// starting cell counts.
fn march_cells(grid: &VoxelGrid, origin: DVec3, dir: DVec3, limit: f64) -> Option<CellHit> {
    if limit < 0.0 {
        return None;
    }
    let local = grid.to_local(origin);
    let start = local.floor();
    let mut cell = IVec3::new(start.x as i32, start.y as i32, start.z as i32);

    if grid.is_solid(cell.x, cell.y, cell.z) {
        let abs = dir.abs();
        let (axis, component) = if abs.x >= abs.y && abs.x >= abs.z {
            (Axis::X, dir.x)
        } else if abs.y >= abs.z {
            (Axis::Y, dir.y)
        } else {
            (Axis::Z, dir.z)
        };
        let step = if component > 0.0 { 1 } else { -1 };
        return Some(CellHit {
            cell,
            face: Direction::entered_by(axis, step),
            distance: 0.0,
        });
    }

    let mut walk_x = AxisWalk::new(local.x, dir.x);
    let mut walk_y = AxisWalk::new(local.y, dir.y);
    let mut walk_z = AxisWalk::new(local.z, dir.z);

    for _ in 0..MAX_PICK_STEPS {
        if walk_x.exhausted(cell.x, grid.width())
            || walk_y.exhausted(cell.y, grid.height())
            || walk_z.exhausted(cell.z, grid.depth())
        {
            return None;
        }

        let (t, axis, step) = if walk_x.t_max < walk_y.t_max && walk_x.t_max < walk_z.t_max {
            (walk_x.advance(&mut cell.x), Axis::X, walk_x.step)
        } else if walk_y.t_max < walk_z.t_max {
            (walk_y.advance(&mut cell.y), Axis::Y, walk_y.step)
        } else {
            (walk_z.advance(&mut cell.z), Axis::Z, walk_z.step)
        };

        if t > limit {
            return None;
        }
        if grid.is_solid(cell.x, cell.y, cell.z) {
            return Some(CellHit {
                cell,
                face: Direction::entered_by(axis, step),
                distance: t,
            });
        }
    }
    None
}
