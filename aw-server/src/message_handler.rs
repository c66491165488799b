use aw_protocol::protocol::packet::{self, Packet};
use aw_sim::BarrierRegistry;
use aw_utils::{ClientId, FromClients, ServerInbound, ServerOutbound, ToClients};
use bevy::math::DVec3;
use bevy::prelude::*;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::editing::{self, Feedback};
use crate::movement;
use crate::sessions::{BodyGuard, Sessions};
use crate::sync;
use crate::tools;

pub fn handle_messages(
    from_clients: Res<FromClients>,
    to_clients: Res<ToClients>,
    config: Res<ServerConfig>,
    mut registry: ResMut<BarrierRegistry>,
    mut sessions: ResMut<Sessions>,
    mut guard: ResMut<BodyGuard>,
) {
    while let Ok(msg) = from_clients.0.try_recv() {
        for out in apply_inbound(msg, &config, &mut registry, &mut sessions, &mut guard) {
            let _ = to_clients.0.send(out);
        }
    }
}

/// Applies one inbound network event to the server state and returns the
/// messages it produces directly. Registry change syncs are planned later
/// from the change log.
pub fn apply_inbound(
    msg: ServerInbound,
    config: &ServerConfig,
    registry: &mut BarrierRegistry,
    sessions: &mut Sessions,
    guard: &mut BodyGuard,
) -> Vec<ServerOutbound> {
    match msg {
        ServerInbound::Joined { client, username } => {
            if !sessions.join(client, &username) {
                info!(%client, %username, "rejecting duplicate login");
                return vec![ServerOutbound::Kick {
                    client,
                    reason: format!("{username} is already connected"),
                }];
            }
            info!(%client, %username, online = sessions.len(), "player joined");
            let editor = aw_sim::EditorId::new(username);
            sync::join_sequence(registry, client, &editor)
        }
        ServerInbound::Left { client } => {
            if let Some(session) = sessions.leave(client) {
                info!(%client, editor = %session.editor, online = sessions.len(), "player left");
            }
            guard.0.forget(&client);
            Vec::new()
        }
        ServerInbound::Packet { client, packet } => {
            handle_packet(client, packet, config, registry, sessions)
        }
    }
}

fn feedback(client: ClientId, feedback: Feedback) -> ServerOutbound {
    ServerOutbound::Send {
        client,
        packet: packet::EditFeedback {
            ok: feedback.ok,
            message: feedback.message,
        }
        .into(),
    }
}

fn handle_packet(
    client: ClientId,
    pkt: Packet,
    config: &ServerConfig,
    registry: &mut BarrierRegistry,
    sessions: &mut Sessions,
) -> Vec<ServerOutbound> {
    let Some(session) = sessions.get_mut(client) else {
        debug!(%client, "dropping {} from unknown client", pkt.name());
        return Vec::new();
    };
    let editor = session.editor.clone();

    let result = match pkt {
        Packet::PlayerMove(mv) => {
            let target = DVec3::new(mv.x, mv.y, mv.z);
            return movement::handle_move(client, session, registry, config, target, mv.on_ground)
                .into_iter()
                .collect();
        }
        Packet::TeleportRequest(tp) => {
            let request = DVec3::new(tp.x, tp.y, tp.z);
            return vec![movement::handle_teleport(
                client,
                session,
                registry,
                config,
                request,
                tp.relative,
            )];
        }
        Packet::SetBarrierFocus(req) => editing::set_focus(registry, &editor, req),
        Packet::SetActiveBarrier(req) => editing::set_active(registry, &editor, req),
        Packet::CreateBarrier(req) => editing::create(registry, &editor, req),
        Packet::RemoveBarrier(req) => editing::remove(registry, &editor, &req.name),
        Packet::ClearBarriers(_) => editing::clear(registry, &editor),
        Packet::ResizeBarrier(req) => editing::resize(registry, &editor, req),
        Packet::EditCell(req) => editing::edit_cell(registry, &editor, req),
        Packet::EditColumn(req) => editing::edit_column(registry, &editor, req),
        Packet::EditLine(req) => editing::edit_line(registry, &editor, req),
        Packet::ToolUse(req) => {
            let terrain = tools::terrain(&config.editing);
            tools::use_tool(registry, &editor, &config.editing, terrain.as_ref(), &req)
        }
        other => {
            debug!(%client, "ignoring {}", other.name());
            return Vec::new();
        }
    };
    debug!(%client, %editor, ok = result.ok, "{}", result.message);
    vec![feedback(client, result)]
}
