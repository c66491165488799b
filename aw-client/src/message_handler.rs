use aw_protocol::protocol::packet::SyncScope;
use aw_utils::{AppState, ApplicationState, FromNet, FromNetMessage, ToNet, ToNetMessage};
use bevy::math::DVec3;
use bevy::prelude::*;
use tracing::{debug, info, warn};

use crate::replica::BarrierReplica;
use crate::script::{Script, WalkPlan};
use crate::sim::reconcile::reconcile;
use crate::sim::{CurrentInput, DebugStats, SimState, WalkInput};

#[derive(Resource, Debug, Default)]
pub struct PendingWalk(pub Option<WalkPlan>);

#[allow(clippy::too_many_arguments)]
pub fn handle_messages(
    from_net: Res<FromNet>,
    to_net: Res<ToNet>,
    mut app_state: ResMut<AppState>,
    mut replica: ResMut<BarrierReplica>,
    mut sim: ResMut<SimState>,
    mut input: ResMut<CurrentInput>,
    mut stats: ResMut<DebugStats>,
    mut script: ResMut<Script>,
    mut walk: ResMut<PendingWalk>,
    mut exit: EventWriter<AppExit>,
) {
    while let Ok(msg) = from_net.0.try_recv() {
        match msg {
            FromNetMessage::Connected => {
                *app_state = AppState(ApplicationState::Connected);
                info!("Connected to server");
                if let Some(plan) = walk.0.take() {
                    sim.current.pos = plan.start;
                    sim.ready = true;
                    input.0 = WalkInput {
                        target: Some(plan.target),
                        speed: plan.speed,
                    };
                    let _ = to_net.0.send(ToNetMessage::PlayerMove {
                        x: plan.start.x,
                        y: plan.start.y,
                        z: plan.start.z,
                        on_ground: true,
                    });
                }
            }
            FromNetMessage::Disconnected => {
                *app_state = AppState(ApplicationState::Disconnected);
                replica.clear();
                warn!("Disconnected from server");
                exit.write(AppExit::error());
            }
            FromNetMessage::Kicked(reason) => {
                warn!("Kicked: {}", reason);
            }
            FromNetMessage::BarrierNames(names) => {
                info!("Barriers: {:?}", names);
                replica.apply_names(names);
            }
            FromNetMessage::BarrierSync { scope, name, grid } => {
                match &grid {
                    Some(grid) => info!(
                        "{} barrier '{}' at ({}, {}) {}x{}x{}, {} solid",
                        scope_label(scope),
                        name,
                        grid.origin_x(),
                        grid.origin_z(),
                        grid.width(),
                        grid.depth(),
                        grid.height(),
                        grid.solid_count()
                    ),
                    None => info!("{} barrier cleared", scope_label(scope)),
                }
                replica.apply_sync(scope, name, grid);
            }
            FromNetMessage::PositionCorrection {
                x,
                y,
                z,
                reset_velocity,
            } => {
                let server_pos = DVec3::new(x, y, z);
                if !sim.ready {
                    sim.current.pos = server_pos;
                    sim.ready = true;
                } else if let Some(result) = reconcile(&mut sim.current, server_pos, reset_velocity)
                {
                    stats.last_correction = result.correction.length();
                    stats.corrections += 1;
                    if result.hard_teleport {
                        stats.hard_teleports += 1;
                    }
                    debug!(
                        correction = ?result.correction,
                        hard = result.hard_teleport,
                        "server corrected position"
                    );
                }
                info!("Position set to ({:.3}, {:.3}, {:.3})", x, y, z);
                script.on_correction();
            }
            FromNetMessage::EditFeedback { ok, message } => {
                if ok {
                    info!("{}", message);
                } else {
                    warn!("{}", message);
                }
                script.on_feedback();
            }
            FromNetMessage::Packet(pkt) => {
                debug!("unhandled packet {}", pkt.name());
            }
        }
    }
}

fn scope_label(scope: SyncScope) -> &'static str {
    match scope {
        SyncScope::Active => "Active",
        SyncScope::Focus => "Focus",
    }
}
