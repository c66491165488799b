use aw_protocol::protocol::packet::{self, RelativeFlags};
use aw_sim::intercept::{absolute_target, intercept_movement, intercept_movement_thick, intercept_teleport};
use aw_sim::{BarrierRegistry, BodyState};
use aw_utils::{ClientId, ServerOutbound, ToClients};
use bevy::math::DVec3;
use bevy::prelude::*;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::sessions::{BodyGuard, Session, Sessions};

fn correction(client: ClientId, pos: DVec3, reset_velocity: bool) -> ServerOutbound {
    ServerOutbound::Send {
        client,
        packet: packet::PositionCorrection {
            x: pos.x,
            y: pos.y,
            z: pos.z,
            reset_velocity,
        }
        .into(),
    }
}

/// Commits a reported move, rewriting it when it would cross the active
/// barrier. Returns the correction to send, if any.
pub fn handle_move(
    client: ClientId,
    session: &mut Session,
    registry: &BarrierRegistry,
    config: &ServerConfig,
    target: DVec3,
    on_ground: bool,
) -> Option<ServerOutbound> {
    if !target.is_finite() {
        warn!(%client, "rejecting non-finite move");
        return session.body.map(|body| correction(client, body.pos, true));
    }
    session.on_ground = on_ground;

    let Some(body) = session.body else {
        session.body = Some(BodyState {
            pos: target,
            vel: DVec3::ZERO,
        });
        return None;
    };

    let intercepted = registry.active_grid().and_then(|grid| {
        let settings = &config.collision;
        if settings.thick_rays {
            intercept_movement_thick(
                grid,
                body.pos,
                target,
                settings.body_half_width,
                &settings.intercept(),
            )
        } else {
            intercept_movement(grid, body.pos, target, &settings.intercept())
        }
    });

    let committed = intercepted.unwrap_or(target);
    session.body = Some(BodyState {
        pos: committed,
        vel: committed - body.pos,
    });

    intercepted.map(|pos| {
        debug!(%client, from = ?body.pos, requested = ?target, corrected = ?pos, "move intercepted");
        correction(client, pos, false)
    })
}

/// Resolves a teleport request against the active barrier. The server always
/// answers with the final position.
pub fn handle_teleport(
    client: ClientId,
    session: &mut Session,
    registry: &BarrierRegistry,
    config: &ServerConfig,
    request: DVec3,
    relative: RelativeFlags,
) -> ServerOutbound {
    let current = session.body.map_or(DVec3::ZERO, |body| body.pos);
    let target = absolute_target(
        current,
        request,
        [
            relative.contains(RelativeFlags::X),
            relative.contains(RelativeFlags::Y),
            relative.contains(RelativeFlags::Z),
        ],
    );
    if !target.is_finite() {
        warn!(%client, "rejecting non-finite teleport");
        return correction(client, current, true);
    }

    let pos = match (session.body, registry.active_grid()) {
        (Some(_), Some(grid)) => {
            intercept_teleport(grid, current, target, &config.collision.intercept())
                .inspect(|pos| debug!(%client, requested = ?target, corrected = ?pos, "teleport intercepted"))
                .unwrap_or(target)
        }
        _ => target,
    };
    session.body = Some(BodyState {
        pos,
        vel: DVec3::ZERO,
    });
    correction(client, pos, true)
}

/// Runs the penetration backstop for every positioned session.
pub fn resolve_penetrations(
    registry: &BarrierRegistry,
    sessions: &mut Sessions,
    guard: &mut BodyGuard,
) -> Vec<ServerOutbound> {
    let grid = registry.active_grid();
    let mut out = Vec::new();
    for (client, session) in sessions.iter_mut() {
        let Some(body) = session.body else {
            continue;
        };
        let outcome = guard.0.step(&client, grid, body);
        session.body = Some(outcome.state);
        if outcome.correction.moved() {
            out.push(correction(client, outcome.state.pos, true));
        }
    }
    out
}

pub fn penetration_tick(
    registry: Res<BarrierRegistry>,
    mut sessions: ResMut<Sessions>,
    mut guard: ResMut<BodyGuard>,
    to_clients: Res<ToClients>,
) {
    for msg in resolve_penetrations(&registry, &mut sessions, &mut guard) {
        let _ = to_clients.0.send(msg);
    }
}
