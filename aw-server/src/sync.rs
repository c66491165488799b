use std::collections::BTreeSet;

use aw_net::snapshot::sync_packet;
use aw_protocol::protocol::packet::{Packet, SyncBarrierNames, SyncScope};
use aw_sim::{BarrierRegistry, EditorId, RegistryChange};
use aw_utils::{ClientId, ServerOutbound, ToClients};
use bevy::prelude::*;
use tracing::debug;

use crate::sessions::Sessions;

#[derive(Resource)]
pub struct ResyncTimer(pub Timer);

pub fn names_packet(registry: &BarrierRegistry) -> Packet {
    SyncBarrierNames {
        names: registry.names().map(str::to_string).collect(),
    }
    .into()
}

pub fn active_packet(registry: &BarrierRegistry) -> Packet {
    sync_packet(
        SyncScope::Active,
        registry.active_name().unwrap_or_default(),
        registry.active_grid(),
    )
}

/// Resolves the editor's focus (assigning one if needed) and builds the
/// matching focus sync.
pub fn focus_packet(registry: &mut BarrierRegistry, editor: &EditorId) -> Packet {
    let name = registry.resolve_focus(editor);
    let grid = name.as_deref().and_then(|name| registry.get(name));
    sync_packet(SyncScope::Focus, name.as_deref().unwrap_or_default(), grid)
}

/// Everything a freshly joined client needs, in order: names, the active
/// barrier, then its focus barrier.
pub fn join_sequence(
    registry: &mut BarrierRegistry,
    client: ClientId,
    editor: &EditorId,
) -> Vec<ServerOutbound> {
    vec![
        ServerOutbound::Send {
            client,
            packet: names_packet(registry),
        },
        ServerOutbound::Send {
            client,
            packet: active_packet(registry),
        },
        ServerOutbound::Send {
            client,
            packet: focus_packet(registry, editor),
        },
    ]
}

/// Turns a drained change log into outbound syncs. Repeated changes within
/// one batch collapse into one message per recipient.
pub fn plan_changes(
    registry: &mut BarrierRegistry,
    sessions: &Sessions,
    changes: Vec<RegistryChange>,
) -> Vec<ServerOutbound> {
    let mut names_changed = false;
    let mut active_changed = false;
    let mut refocus: BTreeSet<EditorId> = BTreeSet::new();

    for change in &changes {
        match change {
            RegistryChange::NamesChanged => names_changed = true,
            RegistryChange::ActiveChanged => active_changed = true,
            RegistryChange::GridEdited(name) => {
                if registry.active_name() == Some(name.as_str()) {
                    active_changed = true;
                }
                refocus.extend(registry.editors_focusing(name).cloned());
            }
            RegistryChange::Removed(name) => {
                refocus.extend(registry.editors_focusing(name).cloned());
            }
            RegistryChange::FocusChanged(editor) => {
                refocus.insert(editor.clone());
            }
        }
    }

    let mut out = Vec::new();
    if names_changed {
        out.push(ServerOutbound::Broadcast(names_packet(registry)));
    }
    if active_changed {
        out.push(ServerOutbound::Broadcast(active_packet(registry)));
    }
    for editor in refocus {
        let Some(client) = sessions.client_of(&editor) else {
            continue;
        };
        out.push(ServerOutbound::Send {
            client,
            packet: focus_packet(registry, &editor),
        });
    }
    out
}

pub fn broadcast_changes(
    mut registry: ResMut<BarrierRegistry>,
    sessions: Res<Sessions>,
    to_clients: Res<ToClients>,
) {
    if !registry.has_pending_changes() {
        return;
    }
    let changes = registry.drain_changes();
    debug!(count = changes.len(), "syncing registry changes");
    for msg in plan_changes(&mut registry, &sessions, changes) {
        let _ = to_clients.0.send(msg);
    }
}

/// Rebroadcasts the active barrier so replicas that missed an update
/// converge.
pub fn periodic_resync(
    time: Res<Time>,
    mut timer: ResMut<ResyncTimer>,
    registry: Res<BarrierRegistry>,
    sessions: Res<Sessions>,
    to_clients: Res<ToClients>,
) {
    if !timer.0.tick(time.delta()).just_finished() || sessions.is_empty() {
        return;
    }
    let _ = to_clients
        .0
        .send(ServerOutbound::Broadcast(active_packet(&registry)));
}
