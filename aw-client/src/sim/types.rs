use bevy::math::DVec3;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WalkInput {
    /// Where to walk; `None` stands still.
    pub target: Option<DVec3>,
    /// Blocks per second.
    pub speed: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayerSimState {
    pub pos: DVec3,
    pub vel: DVec3,
    pub on_ground: bool,
}

impl Default for PlayerSimState {
    fn default() -> Self {
        Self {
            pos: DVec3::ZERO,
            vel: DVec3::ZERO,
            on_ground: true,
        }
    }
}
