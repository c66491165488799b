use aw_sim::BodySize;
use aw_utils::{AppState, ApplicationState, ToNet, ToNetMessage};
use bevy::prelude::*;
use tracing::info;

use crate::replica::BarrierReplica;
use crate::sim::predict::{simulate_tick, walk_finished};
use crate::sim::{CurrentInput, SimClock, SimState};

/// Sent at least this often while standing still so the server keeps a
/// current position.
const IDLE_MOVE_INTERVAL: u32 = 20;

pub fn fixed_sim_tick_system(
    time: Res<Time>,
    app_state: Res<AppState>,
    replica: Res<BarrierReplica>,
    to_net: Res<ToNet>,
    mut clock: ResMut<SimClock>,
    mut sim: ResMut<SimState>,
    mut input: ResMut<CurrentInput>,
) {
    if app_state.0 != ApplicationState::Connected || !sim.ready {
        return;
    }
    clock.tick = clock.tick.wrapping_add(1);

    let before = sim.current;
    let next = simulate_tick(
        &before,
        &input.0,
        time.delta_secs_f64(),
        replica.active_grid(),
        BodySize::default(),
    );
    let moved = (next.pos - before.pos).length() > 1e-6;
    sim.stalled_ticks = if moved { 0 } else { sim.stalled_ticks + 1 };
    sim.current = next;

    if input.0.target.is_some() && walk_finished(&sim.current, &input.0, sim.stalled_ticks) {
        let pos = sim.current.pos;
        info!("Walk finished at ({:.3}, {:.3}, {:.3})", pos.x, pos.y, pos.z);
        input.0.target = None;
    }

    if moved || clock.tick % IDLE_MOVE_INTERVAL == 0 {
        let pos = sim.current.pos;
        let _ = to_net.0.send(ToNetMessage::PlayerMove {
            x: pos.x,
            y: pos.y,
            z: pos.z,
            on_ground: sim.current.on_ground,
        });
    }
}
