use bevy::math::{DVec3, IVec3};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// A cell face, named by the direction its outward normal points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Direction {
    /// The face a ray crosses when it steps `step` cells along `axis`.
    /// Stepping +X enters through the west face, and so on.
    pub fn entered_by(axis: Axis, step: i32) -> Direction {
        match (axis, step > 0) {
            (Axis::X, true) => Direction::West,
            (Axis::X, false) => Direction::East,
            (Axis::Y, true) => Direction::Down,
            (Axis::Y, false) => Direction::Up,
            (Axis::Z, true) => Direction::North,
            (Axis::Z, false) => Direction::South,
        }
    }

    /// Offset from a cell to its neighbour across this face.
    pub fn offset(&self) -> IVec3 {
        match *self {
            Direction::Down => IVec3::NEG_Y,
            Direction::Up => IVec3::Y,
            Direction::North => IVec3::NEG_Z,
            Direction::South => IVec3::Z,
            Direction::West => IVec3::NEG_X,
            Direction::East => IVec3::X,
        }
    }

    pub fn normal(&self) -> DVec3 {
        self.offset().as_dvec3()
    }

    pub fn axis(&self) -> Axis {
        match *self {
            Direction::Down | Direction::Up => Axis::Y,
            Direction::North | Direction::South => Axis::Z,
            Direction::West | Direction::East => Axis::X,
        }
    }
}
