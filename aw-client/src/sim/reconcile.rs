use bevy::math::DVec3;

use super::types::PlayerSimState;

const SMALL_EPS: f64 = 0.001;
const HARD_TELEPORT: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileResult {
    pub correction: DVec3,
    pub hard_teleport: bool,
}

/// Adopts a server position correction. The server's answer always wins;
/// the result only describes how far off the prediction was.
pub fn reconcile(
    current: &mut PlayerSimState,
    server_pos: DVec3,
    reset_velocity: bool,
) -> Option<ReconcileResult> {
    if reset_velocity {
        current.vel = DVec3::ZERO;
    }
    let err = server_pos - current.pos;
    let err_len = err.length();
    if err_len < SMALL_EPS {
        return None;
    }

    current.pos = server_pos;
    Some(ReconcileResult {
        correction: err,
        hard_teleport: err_len >= HARD_TELEPORT,
    })
}
