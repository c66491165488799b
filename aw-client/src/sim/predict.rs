use aw_sim::{BarrierCollision, BodySize, VoxelGrid};
use bevy::math::DVec3;

use super::types::{PlayerSimState, WalkInput};

/// Closer than this to the target counts as arrived.
pub const ARRIVE_EPS: f64 = 1e-3;

/// Advances the local body one tick toward its walk target, colliding with
/// the replicated active barrier.
pub fn simulate_tick(
    state: &PlayerSimState,
    input: &WalkInput,
    dt: f64,
    grid: Option<&VoxelGrid>,
    size: BodySize,
) -> PlayerSimState {
    let Some(target) = input.target else {
        return PlayerSimState {
            vel: DVec3::ZERO,
            ..*state
        };
    };

    let to_target = DVec3::new(target.x - state.pos.x, 0.0, target.z - state.pos.z);
    let dist = to_target.length();
    if dist < ARRIVE_EPS || dt <= 0.0 || input.speed <= 0.0 {
        return PlayerSimState {
            vel: DVec3::ZERO,
            ..*state
        };
    }
    let step = (input.speed * dt).min(dist);
    let motion = to_target / dist * step;

    let (pos, vel) = BarrierCollision::from_option(grid).move_body(state.pos, motion, size);
    PlayerSimState {
        pos,
        vel,
        on_ground: state.on_ground,
    }
}

/// Whether the walk is over: arrived, or pressed against a wall.
pub fn walk_finished(state: &PlayerSimState, input: &WalkInput, stalled_ticks: u32) -> bool {
    let Some(target) = input.target else {
        return true;
    };
    let remaining = DVec3::new(target.x - state.pos.x, 0.0, target.z - state.pos.z).length();
    remaining < ARRIVE_EPS || stalled_ticks >= super::MAX_STALLED_TICKS
}
