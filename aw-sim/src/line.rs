/// Integer Bresenham walk over (x, z), both endpoints included.
#[derive(Debug, Clone)]
pub struct BresenhamLine {
    x: i64,
    z: i64,
    end_x: i64,
    end_z: i64,
    dx: i64,
    dz: i64,
    sx: i64,
    sz: i64,
    err: i64,
    done: bool,
}

impl BresenhamLine {
    pub fn new(x1: i32, z1: i32, x2: i32, z2: i32) -> Self {
        let (x1, z1, x2, z2) = (i64::from(x1), i64::from(z1), i64::from(x2), i64::from(z2));
        let dx = (x2 - x1).abs();
        let dz = (z2 - z1).abs();
        Self {
            x: x1,
            z: z1,
            end_x: x2,
            end_z: z2,
            dx,
            dz,
            sx: if x1 < x2 { 1 } else { -1 },
            sz: if z1 < z2 { 1 } else { -1 },
            err: dx - dz,
            done: false,
        }
    }

    /// Number of points the walk yields.
    pub fn span(&self) -> u64 {
        self.dx.max(self.dz) as u64 + 1
    }
}

impl Iterator for BresenhamLine {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<(i32, i32)> {
        if self.done {
            return None;
        }
        let point = (self.x as i32, self.z as i32);
        if self.x == self.end_x && self.z == self.end_z {
            self.done = true;
            return Some(point);
        }
        let e2 = 2 * self.err;
        if e2 > -self.dz {
            self.err -= self.dz;
            self.x += self.sx;
        }
        if e2 < self.dx {
            self.err += self.dx;
            self.z += self.sz;
        }
        Some(point)
    }
}
