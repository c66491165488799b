use bevy::math::{DVec3, IVec3};

use crate::aabb::Aabb;

pub const EMPTY: u8 = 0;
pub const SOLID: u8 = 1;

pub const MAX_WIDTH: i32 = 10_000;
pub const MAX_DEPTH: i32 = 10_000;
pub const MAX_HEIGHT: i32 = 1_024;
/// Bit-packed, the largest grid still fits in one protocol frame.
pub const MAX_GRID_CELLS: usize = 1 << 25;

/// Number of cells for the given dimensions, or `None` when they are not a
/// valid barrier size.
pub fn cell_count(width: i32, depth: i32, height: i32) -> Option<usize> {
    if width <= 0 || depth <= 0 || height <= 0 {
        return None;
    }
    if width > MAX_WIDTH || depth > MAX_DEPTH || height > MAX_HEIGHT {
        return None;
    }
    let count = (width as usize)
        .checked_mul(depth as usize)?
        .checked_mul(height as usize)?;
    (count <= MAX_GRID_CELLS).then_some(count)
}

/// One barrier: an axis-aligned block of unit cells anchored at a world
/// (x, z) origin. Local y is world y.
///
/// Cells are stored x-fastest: `x + z * width + y * width * depth`.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelGrid {
    origin_x: f64,
    origin_z: f64,
    width: i32,
    depth: i32,
    height: i32,
    cells: Vec<u8>,
}

impl VoxelGrid {
    pub fn new(origin_x: f64, origin_z: f64, width: i32, depth: i32, height: i32) -> Option<Self> {
        let count = cell_count(width, depth, height)?;
        if !origin_x.is_finite() || !origin_z.is_finite() {
            return None;
        }
        Some(Self {
            origin_x,
            origin_z,
            width,
            depth,
            height,
            cells: vec![EMPTY; count],
        })
    }

    /// Rebuilds a grid from raw bytes. Any non-zero byte counts as solid.
    pub fn from_cells(
        origin_x: f64,
        origin_z: f64,
        width: i32,
        depth: i32,
        height: i32,
        mut cells: Vec<u8>,
    ) -> Option<Self> {
        let mut grid = Self::new(origin_x, origin_z, width, depth, height)?;
        if cells.len() != grid.cells.len() {
            return None;
        }
        for cell in &mut cells {
            if *cell != EMPTY {
                *cell = SOLID;
            }
        }
        grid.cells = cells;
        Some(grid)
    }

    /// Expands a height-less record (one byte per column, `x + z * width`)
    /// into a full grid where every solid column is solid on every layer.
    pub fn from_legacy_columns(
        origin_x: f64,
        origin_z: f64,
        width: i32,
        depth: i32,
        height: i32,
        columns: &[u8],
    ) -> Option<Self> {
        let mut grid = Self::new(origin_x, origin_z, width, depth, height)?;
        let layer = (width as usize) * (depth as usize);
        if columns.len() != layer {
            return None;
        }
        for (i, &column) in columns.iter().enumerate() {
            if column == EMPTY {
                continue;
            }
            for y in 0..height as usize {
                grid.cells[i + y * layer] = SOLID;
            }
        }
        Some(grid)
    }

    pub fn origin_x(&self) -> f64 {
        self.origin_x
    }

    pub fn origin_z(&self) -> f64 {
        self.origin_z
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        self.contains_column(x, z) && y >= 0 && y < self.height
    }

    pub fn contains_column(&self, x: i32, z: i32) -> bool {
        x >= 0 && x < self.width && z >= 0 && z < self.depth
    }

    fn index(&self, x: i32, y: i32, z: i32) -> Option<usize> {
        if !self.contains(x, y, z) {
            return None;
        }
        let (w, d) = (self.width as usize, self.depth as usize);
        Some(x as usize + z as usize * w + y as usize * w * d)
    }

    pub fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
        self.index(x, y, z)
            .is_some_and(|idx| self.cells[idx] != EMPTY)
    }

    /// Returns whether the cell changed.
    pub fn set_solid(&mut self, x: i32, y: i32, z: i32, solid: bool) -> bool {
        let Some(idx) = self.index(x, y, z) else {
            return false;
        };
        let value = if solid { SOLID } else { EMPTY };
        if self.cells[idx] == value {
            return false;
        }
        self.cells[idx] = value;
        true
    }

    /// Sets every layer of one column. Returns whether any cell changed.
    pub fn set_column(&mut self, x: i32, z: i32, solid: bool) -> bool {
        if !self.contains_column(x, z) {
            return false;
        }
        let mut changed = false;
        for y in 0..self.height {
            changed |= self.set_solid(x, y, z, solid);
        }
        changed
    }

    /// Whether any layer in `y_min..=y_max` of the column is solid.
    pub fn column_has_solid(&self, x: i32, z: i32, y_min: i32, y_max: i32) -> bool {
        if !self.contains_column(x, z) {
            return false;
        }
        let lo = y_min.max(0);
        let hi = y_max.min(self.height - 1);
        (lo..=hi).any(|y| self.is_solid(x, y, z))
    }

    /// Reallocates the grid. Previous contents are discarded.
    pub fn resize(
        &mut self,
        origin_x: f64,
        origin_z: f64,
        width: i32,
        depth: i32,
        height: i32,
    ) -> bool {
        match Self::new(origin_x, origin_z, width, depth, height) {
            Some(fresh) => {
                *self = fresh;
                true
            }
            None => false,
        }
    }

    pub fn solid_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c != EMPTY).count()
    }

    pub fn to_local(&self, world: DVec3) -> DVec3 {
        DVec3::new(world.x - self.origin_x, world.y, world.z - self.origin_z)
    }

    /// Local cell containing a world point.
    pub fn local_cell(&self, world: DVec3) -> IVec3 {
        let local = self.to_local(world).floor();
        IVec3::new(local.x as i32, local.y as i32, local.z as i32)
    }

    /// Local cell holding the minimum corner of the world block at `block`.
    pub fn block_to_local(&self, block: IVec3) -> IVec3 {
        self.local_cell(block.as_dvec3())
    }

    /// World-space box of a local cell.
    pub fn cell_box(&self, x: i32, y: i32, z: i32) -> Aabb {
        Aabb::unit_cell(
            self.origin_x + f64::from(x),
            f64::from(y),
            self.origin_z + f64::from(z),
        )
    }
}
