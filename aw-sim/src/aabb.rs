use bevy::math::DVec3;

pub const COLLISION_EPS: f64 = 1e-7;

/// Half width and height of an upright body whose position is its feet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodySize {
    pub half_width: f64,
    pub height: f64,
}

impl Default for BodySize {
    fn default() -> Self {
        Self {
            half_width: 0.3,
            height: 1.8,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    pub fn unit_cell(x: f64, y: f64, z: f64) -> Self {
        Self {
            min: DVec3::new(x, y, z),
            max: DVec3::new(x + 1.0, y + 1.0, z + 1.0),
        }
    }

    pub fn around_feet(pos: DVec3, size: BodySize) -> Self {
        Self::new(
            DVec3::new(pos.x - size.half_width, pos.y, pos.z - size.half_width),
            DVec3::new(
                pos.x + size.half_width,
                pos.y + size.height,
                pos.z + size.half_width,
            ),
        )
    }

    pub fn feet_position(&self) -> DVec3 {
        DVec3::new(
            (self.min.x + self.max.x) * 0.5,
            self.min.y,
            (self.min.z + self.max.z) * 0.5,
        )
    }

    pub fn offset(self, delta: DVec3) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
        }
    }

    pub fn expanded_by_motion(self, motion: DVec3) -> Self {
        Self {
            min: self.min.min(self.min + motion),
            max: self.max.max(self.max + motion),
        }
    }

    pub fn inflate(self, amount: f64) -> Self {
        Self {
            min: self.min - DVec3::splat(amount),
            max: self.max + DVec3::splat(amount),
        }
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.max.x > other.min.x
            && self.min.x < other.max.x
            && self.max.y > other.min.y
            && self.min.y < other.max.y
            && self.max.z > other.min.z
            && self.min.z < other.max.z
    }

    fn overlap_xz(&self, other: &Aabb) -> bool {
        self.max.x > other.min.x
            && self.min.x < other.max.x
            && self.max.z > other.min.z
            && self.min.z < other.max.z
    }

    fn overlap_yz(&self, other: &Aabb) -> bool {
        self.max.y > other.min.y
            && self.min.y < other.max.y
            && self.max.z > other.min.z
            && self.min.z < other.max.z
    }

    fn overlap_xy(&self, other: &Aabb) -> bool {
        self.max.x > other.min.x
            && self.min.x < other.max.x
            && self.max.y > other.min.y
            && self.min.y < other.max.y
    }

    /// Clips a Y motion of `self` so it stops at `block`.
    pub fn clip_y(&self, block: &Aabb, mut dy: f64) -> f64 {
        if !self.overlap_xz(block) {
            return dy;
        }
        if dy > 0.0 && self.max.y <= block.min.y {
            dy = dy.min(block.min.y - self.max.y);
        } else if dy < 0.0 && self.min.y >= block.max.y {
            dy = dy.max(block.max.y - self.min.y);
        }
        dy
    }

    pub fn clip_x(&self, block: &Aabb, mut dx: f64) -> f64 {
        if !self.overlap_yz(block) {
            return dx;
        }
        if dx > 0.0 && self.max.x <= block.min.x {
            dx = dx.min(block.min.x - self.max.x);
        } else if dx < 0.0 && self.min.x >= block.max.x {
            dx = dx.max(block.max.x - self.min.x);
        }
        dx
    }

    pub fn clip_z(&self, block: &Aabb, mut dz: f64) -> f64 {
        if !self.overlap_xy(block) {
            return dz;
        }
        if dz > 0.0 && self.max.z <= block.min.z {
            dz = dz.min(block.min.z - self.max.z);
        } else if dz < 0.0 && self.min.z >= block.max.z {
            dz = dz.max(block.max.z - self.min.z);
        }
        dz
    }
}

/// Integer cell range covered by `[min, max]`, ignoring faces that only touch.
pub fn cell_range(min: f64, max: f64) -> (i32, i32) {
    let min_i = (min + COLLISION_EPS).floor() as i32;
    let max_i = (max - COLLISION_EPS).floor() as i32;
    if min_i <= max_i {
        (min_i, max_i)
    } else {
        (max_i, min_i)
    }
}
