use bevy::prelude::Resource;

pub mod predict;
pub mod reconcile;
pub mod types;

pub use types::{PlayerSimState, WalkInput};

/// Ticks without progress before a walk gives up.
pub const MAX_STALLED_TICKS: u32 = 20;

#[derive(Debug, Default, Resource)]
pub struct SimClock {
    pub tick: u32,
}

#[derive(Debug, Default, Resource)]
pub struct CurrentInput(pub WalkInput);

#[derive(Debug, Default, Resource)]
pub struct SimState {
    pub current: PlayerSimState,
    /// Set once the body has a starting position.
    pub ready: bool,
    pub stalled_ticks: u32,
}

#[derive(Debug, Default, Resource)]
pub struct DebugStats {
    pub last_correction: f64,
    pub corrections: u32,
    pub hard_teleports: u32,
}

#[cfg(test)]
mod tests;
