use bevy::math::{DVec3, IVec2};

use crate::aabb::cell_range;
use crate::face::{Axis, Direction};
use crate::grid::VoxelGrid;

pub const DEFAULT_CLEARANCE_PADDING: f64 = 0.35;
pub const DEFAULT_TELEPORT_BOUNCE: f64 = 0.5;
pub const DEFAULT_MAX_STEPS: u32 = 200;

const MIN_DISPLACEMENT: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterceptConfig {
    /// Distance kept between a corrected position and the face it hit.
    pub clearance_padding: f64,
    /// Distance a blocked teleport is pushed back from the face.
    pub teleport_bounce: f64,
    /// Column steps a movement trace may take inside the grid.
    pub max_steps: u32,
    /// Height of the moving body; widens the vertical band that blocks.
    pub body_height: f64,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            clearance_padding: DEFAULT_CLEARANCE_PADDING,
            teleport_bounce: DEFAULT_TELEPORT_BOUNCE,
            max_steps: DEFAULT_MAX_STEPS,
            body_height: 1.8,
        }
    }
}

/// First barrier face crossed by a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallIntercept {
    /// World point on the entered face.
    pub point: DVec3,
    /// Entered face; its normal points back toward the segment start.
    pub face: Direction,
    /// Segment parameter at the face, in `[0, 1]`.
    pub t_enter: f64,
    /// Local (x, z) of the blocking column.
    pub cell: IVec2,
}

impl WallIntercept {
    pub fn normal(&self) -> DVec3 {
        self.face.normal()
    }
}

/// One axis of a grid walk: which way it steps, and the ray parameter of
/// its next cell boundary. The parameter is recomputed from the cell index
/// on every step so long walks do not drift.
pub(crate) struct AxisWalk {
    pub(crate) step: i32,
    origin: f64,
    delta: f64,
    pub(crate) t_max: f64,
}

impl AxisWalk {
    pub(crate) fn new(origin: f64, delta: f64) -> Self {
        Self::from_cell(origin, delta, origin.floor() as i32)
    }

    /// Walk along `origin + delta * t` that is currently in `cell`.
    pub(crate) fn from_cell(origin: f64, delta: f64, cell: i32) -> Self {
        if delta.abs() < 1e-12 {
            return Self {
                step: 0,
                origin,
                delta,
                t_max: f64::INFINITY,
            };
        }
        let mut walk = Self {
            step: if delta > 0.0 { 1 } else { -1 },
            origin,
            delta,
            t_max: f64::INFINITY,
        };
        walk.t_max = walk.boundary_t(cell);
        walk
    }

    fn boundary_t(&self, cell: i32) -> f64 {
        let boundary = if self.step > 0 {
            f64::from(cell) + 1.0
        } else {
            f64::from(cell)
        };
        (boundary - self.origin) / self.delta
    }

    pub(crate) fn advance(&mut self, cell: &mut i32) -> f64 {
        let t = self.t_max;
        *cell = cell.saturating_add(self.step);
        self.t_max = self.boundary_t(*cell);
        t
    }

    /// Whether `cell` has moved past `[0, len)` and can never come back.
    pub(crate) fn exhausted(&self, cell: i32, len: i32) -> bool {
        match self.step {
            1 => cell >= len,
            -1 => cell < 0,
            _ => cell < 0 || cell >= len,
        }
    }
}

/// Parameter range of `origin + delta * t` inside `[0, len)`.
fn slab(origin: f64, delta: f64, len: f64) -> Option<(f64, f64)> {
    if delta.abs() < 1e-12 {
        return (origin >= 0.0 && origin < len).then_some((f64::NEG_INFINITY, f64::INFINITY));
    }
    let a = -origin / delta;
    let b = (len - origin) / delta;
    Some((a.min(b), a.max(b)))
}

/// Where a segment starting outside the grid rectangle first enters it.
struct Entry {
    t: f64,
    axis: Axis,
    cell_x: i32,
    cell_z: i32,
}

enum Clip {
    Inside,
    Enters(Entry),
}

fn clip_to_grid(grid: &VoxelGrid, from: DVec3, dx: f64, dz: f64) -> Option<Clip> {
    let (x0, x1) = slab(from.x, dx, f64::from(grid.width()))?;
    let (z0, z1) = slab(from.z, dz, f64::from(grid.depth()))?;
    let t0 = x0.max(z0);
    let t1 = x1.min(z1);
    if t0 >= t1 || t1 <= 0.0 || t0 > 1.0 {
        return None;
    }
    if t0 <= 0.0 {
        return Some(Clip::Inside);
    }

    let axis = if x0 > z0 { Axis::X } else { Axis::Z };
    let edge = |delta: f64, len: i32| if delta > 0.0 { 0 } else { len - 1 };
    let inner = |origin: f64, delta: f64, len: i32| {
        ((origin + delta * t0).floor() as i32).clamp(0, len - 1)
    };
    let (cell_x, cell_z) = match axis {
        Axis::X => (edge(dx, grid.width()), inner(from.z, dz, grid.depth())),
        _ => (inner(from.x, dx, grid.width()), edge(dz, grid.depth())),
    };
    Some(Clip::Enters(Entry {
        t: t0,
        axis,
        cell_x,
        cell_z,
    }))
}

/// Moves the blocked-axis coordinate of `point` exactly onto `face` of the
/// local column `cell`.
fn snap_to_face(grid: &VoxelGrid, point: &mut DVec3, face: Direction, cell: IVec2) {
    match face {
        Direction::West => point.x = grid.origin_x() + f64::from(cell.x),
        Direction::East => point.x = grid.origin_x() + f64::from(cell.x) + 1.0,
        Direction::North => point.z = grid.origin_z() + f64::from(cell.y),
        Direction::South => point.z = grid.origin_z() + f64::from(cell.y) + 1.0,
        Direction::Up | Direction::Down => {}
    }
}

fn intercept_at(
    grid: &VoxelGrid,
    start: DVec3,
    end: DVec3,
    t: f64,
    axis: Axis,
    step: i32,
    cell: IVec2,
) -> WallIntercept {
    let face = Direction::entered_by(axis, step);
    let mut point = start + (end - start) * t;
    // Snap onto the face to cancel rounding from the lerp.
    snap_to_face(grid, &mut point, face, cell);
    WallIntercept {
        point,
        face,
        t_enter: t,
        cell,
    }
}

/// Walks the (x, z) columns crossed by `start -> end` and returns the first
/// one holding a solid cell inside the vertical band of a body of
/// `body_height` travelling along the segment. The band covers the layers
/// the body overlaps plus the layer under its feet. The starting column is
/// not tested. Ties between the two axes step Z first.
///
/// The segment is clipped to the grid rectangle first, so at most
/// `width + depth` columns are visited whatever `max_steps` says.
pub fn trace_segment(
    grid: &VoxelGrid,
    start: DVec3,
    end: DVec3,
    body_height: f64,
    max_steps: u32,
) -> Option<WallIntercept> {
    if !start.is_finite() || !end.is_finite() {
        return None;
    }
    let from = grid.to_local(start);
    let to = grid.to_local(end);
    let dx = to.x - from.x;
    let dz = to.z - from.z;
    if dx.abs() < MIN_DISPLACEMENT && dz.abs() < MIN_DISPLACEMENT {
        return None;
    }

    let (body_lo, y_max) =
        cell_range(start.y.min(end.y), start.y.max(end.y) + body_height.max(0.0));
    // The layer under the feet blocks, unless the body already stands on
    // that layer where it starts.
    let below = body_lo.saturating_sub(1);
    let supported = grid.column_has_solid(from.x.floor() as i32, from.z.floor() as i32, below, below);
    let y_min = if supported { body_lo } else { below };
    let solid_at = |x: i32, z: i32| grid.column_has_solid(x, z, y_min, y_max);

    let (mut cell_x, mut cell_z) = match clip_to_grid(grid, from, dx, dz)? {
        Clip::Inside => (from.x.floor() as i32, from.z.floor() as i32),
        Clip::Enters(entry) => {
            if solid_at(entry.cell_x, entry.cell_z) {
                let step = match entry.axis {
                    Axis::X => dx.signum() as i32,
                    _ => dz.signum() as i32,
                };
                let cell = IVec2::new(entry.cell_x, entry.cell_z);
                return Some(intercept_at(grid, start, end, entry.t, entry.axis, step, cell));
            }
            (entry.cell_x, entry.cell_z)
        }
    };

    let mut walk_x = AxisWalk::from_cell(from.x, dx, cell_x);
    let mut walk_z = AxisWalk::from_cell(from.z, dz, cell_z);
    let grid_steps = u32::try_from(grid.width().saturating_add(grid.depth())).unwrap_or(u32::MAX);

    for _ in 0..max_steps.min(grid_steps) {
        if walk_x.exhausted(cell_x, grid.width()) || walk_z.exhausted(cell_z, grid.depth()) {
            return None;
        }

        let (t, axis, step) = if walk_x.t_max < walk_z.t_max {
            (walk_x.advance(&mut cell_x), Axis::X, walk_x.step)
        } else {
            (walk_z.advance(&mut cell_z), Axis::Z, walk_z.step)
        };

        if t > 1.0 {
            return None;
        }

        if solid_at(cell_x, cell_z) {
            let cell = IVec2::new(cell_x, cell_z);
            return Some(intercept_at(grid, start, end, t, axis, step, cell));
        }
    }
    None
}

/// Corrects a continuous move that crosses a barrier. Returns `None` when
/// the move is clear, otherwise the position the mover should end at.
///
/// The blocked axis stops `clearance_padding` in front of the face, the open
/// axis keeps the full motion, and Y is the requested end Y.
pub fn intercept_movement(
    grid: &VoxelGrid,
    start: DVec3,
    end: DVec3,
    config: &InterceptConfig,
) -> Option<DVec3> {
    let hit = trace_segment(grid, start, end, config.body_height, config.max_steps)?;
    Some(slide_along(grid, end, &hit, config))
}

/// Like [`intercept_movement`], but also casts two rays offset `radius` to
/// each side of the motion so a wide body cannot slip past a wall corner.
pub fn intercept_movement_thick(
    grid: &VoxelGrid,
    start: DVec3,
    end: DVec3,
    radius: f64,
    config: &InterceptConfig,
) -> Option<DVec3> {
    let hit = trace_thick(grid, start, end, radius, config)?;
    Some(slide_along(grid, end, &hit, config))
}

/// Earliest hit among the center line and the two side lines. Side hits are
/// shifted back onto the center line.
pub fn trace_thick(
    grid: &VoxelGrid,
    start: DVec3,
    end: DVec3,
    radius: f64,
    config: &InterceptConfig,
) -> Option<WallIntercept> {
    let center = trace_segment(grid, start, end, config.body_height, config.max_steps);

    let planar = DVec3::new(end.x - start.x, 0.0, end.z - start.z);
    let len = planar.length();
    if len < MIN_DISPLACEMENT || radius <= 0.0 {
        return center;
    }
    let lateral = DVec3::new(-planar.z / len, 0.0, planar.x / len) * radius;

    let mut best = center;
    for offset in [lateral, -lateral] {
        let Some(mut hit) = trace_segment(
            grid,
            start + offset,
            end + offset,
            config.body_height,
            config.max_steps,
        ) else {
            continue;
        };
        if best.is_some_and(|b| b.t_enter <= hit.t_enter) {
            continue;
        }
        hit.point -= offset;
        snap_to_face(grid, &mut hit.point, hit.face, hit.cell);
        best = Some(hit);
    }
    best
}

fn slide_along(grid: &VoxelGrid, end: DVec3, hit: &WallIntercept, config: &InterceptConfig) -> DVec3 {
    let n = hit.normal();
    let pivot = DVec3::new(
        hit.point.x + n.x * config.clearance_padding,
        end.y,
        hit.point.z + n.z * config.clearance_padding,
    );
    let slid = match hit.face.axis() {
        Axis::X => DVec3::new(pivot.x, end.y, end.z),
        _ => DVec3::new(end.x, end.y, pivot.z),
    };
    match trace_segment(grid, pivot, slid, config.body_height, config.max_steps) {
        Some(_) => pivot,
        None => slid,
    }
}

/// Resolves per-axis relative teleport coordinates against the current
/// position.
pub fn absolute_target(current: DVec3, target: DVec3, relative: [bool; 3]) -> DVec3 {
    DVec3::new(
        if relative[0] { current.x + target.x } else { target.x },
        if relative[1] { current.y + target.y } else { target.y },
        if relative[2] { current.z + target.z } else { target.z },
    )
}

/// Checks a discontinuous move. When it crosses a barrier the result is the
/// entry point pushed `teleport_bounce` back out of the face, with Y taken
/// from the segment at the entry parameter.
pub fn intercept_teleport(
    grid: &VoxelGrid,
    from: DVec3,
    to: DVec3,
    config: &InterceptConfig,
) -> Option<DVec3> {
    // A teleport may jump any distance; the walk is bounded by the grid.
    let hit = trace_segment(grid, from, to, config.body_height, u32::MAX)?;
    Some(hit.point + hit.normal() * config.teleport_bounce)
}
