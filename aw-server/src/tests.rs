use aw_protocol::protocol::packet::{
    self, EditCell, Packet, RelativeFlags, SyncScope, ToolAction, ToolUse,
};
use aw_sim::{BarrierRegistry, BodyState, EditorId};
use aw_utils::{ClientId, ServerInbound, ServerOutbound};
use bevy::app::{App, AppExit, Last};
use bevy::math::DVec3;

use crate::config::{ConfigError, ServerConfig};
use crate::message_handler::apply_inbound;
use crate::movement::resolve_penetrations;
use crate::persist::{
    StorePath, decode_store, encode_store, load_registry, save_on_exit, save_registry,
};
use crate::sessions::{BodyGuard, Sessions};
use crate::sync::plan_changes;

const ALICE: ClientId = ClientId(1);
const BOB: ClientId = ClientId(2);

struct World {
    config: ServerConfig,
    registry: BarrierRegistry,
    sessions: Sessions,
    guard: BodyGuard,
}

impl World {
    /// A 5x5x5 barrier "gate" at the origin with a solid wall at local x = 2,
    /// active for everyone.
    fn new() -> Self {
        let config = ServerConfig::default();
        let mut registry = BarrierRegistry::new();
        assert!(registry.create("gate", 0.0, 0.0, 5, 5, 5));
        for z in 0..5 {
            registry.set_column("gate", 2, z, true);
        }
        assert!(registry.set_active(Some("gate")));
        registry.drain_changes();
        let guard = BodyGuard::new(config.collision.penetration());
        Self {
            config,
            registry,
            sessions: Sessions::default(),
            guard,
        }
    }

    fn inbound(&mut self, msg: ServerInbound) -> Vec<ServerOutbound> {
        apply_inbound(
            msg,
            &self.config,
            &mut self.registry,
            &mut self.sessions,
            &mut self.guard,
        )
    }

    fn join(&mut self, client: ClientId, username: &str) -> Vec<ServerOutbound> {
        self.inbound(ServerInbound::Joined {
            client,
            username: username.to_string(),
        })
    }

    fn send(&mut self, client: ClientId, packet: impl Into<Packet>) -> Vec<ServerOutbound> {
        self.inbound(ServerInbound::Packet {
            client,
            packet: packet.into(),
        })
    }

    fn sync(&mut self) -> Vec<ServerOutbound> {
        let changes = self.registry.drain_changes();
        plan_changes(&mut self.registry, &self.sessions, changes)
    }
}

fn sent_packet(msg: &ServerOutbound) -> (&Packet, Option<ClientId>) {
    match msg {
        ServerOutbound::Send { client, packet } => (packet, Some(*client)),
        ServerOutbound::Broadcast(packet) => (packet, None),
        ServerOutbound::Kick { .. } => panic!("unexpected kick"),
    }
}

fn barrier_sync(msg: &ServerOutbound) -> (SyncScope, &str, bool, Option<ClientId>) {
    match sent_packet(msg) {
        (Packet::SyncBarrier(sync), to) => {
            (sync.scope, sync.name.as_str(), sync.snapshot.is_some(), to)
        }
        (other, _) => panic!("expected SyncBarrier, got {other:?}"),
    }
}

fn feedback_ok(out: &[ServerOutbound]) -> bool {
    match out {
        [msg] => match sent_packet(msg) {
            (Packet::EditFeedback(fb), _) => fb.ok,
            (other, _) => panic!("expected EditFeedback, got {other:?}"),
        },
        _ => panic!("expected one message, got {out:?}"),
    }
}

fn feedback_message(out: &[ServerOutbound]) -> &str {
    match out {
        [msg] => match sent_packet(msg) {
            (Packet::EditFeedback(fb), _) => fb.message.as_str(),
            (other, _) => panic!("expected EditFeedback, got {other:?}"),
        },
        _ => panic!("expected one message, got {out:?}"),
    }
}

fn correction_of(msg: &ServerOutbound) -> (DVec3, bool) {
    match sent_packet(msg) {
        (Packet::PositionCorrection(pc), _) => (DVec3::new(pc.x, pc.y, pc.z), pc.reset_velocity),
        (other, _) => panic!("expected PositionCorrection, got {other:?}"),
    }
}

fn assert_near(a: DVec3, b: DVec3) {
    assert!((a - b).length() < 1e-9, "{a:?} != {b:?}");
}

#[test]
fn join_sends_names_then_active_then_focus() {
    let mut world = World::new();
    assert!(world.registry.create("side", 10.0, 0.0, 2, 2, 2));
    world.registry.drain_changes();
    world.registry.mark_saved();

    let out = world.join(ALICE, "alice");
    assert_eq!(out.len(), 3);
    match sent_packet(&out[0]) {
        (Packet::SyncBarrierNames(names), Some(ALICE)) => {
            assert_eq!(names.names, vec!["gate".to_string(), "side".to_string()]);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(barrier_sync(&out[1]), (SyncScope::Active, "gate", true, Some(ALICE)));
    assert_eq!(barrier_sync(&out[2]), (SyncScope::Focus, "gate", true, Some(ALICE)));

    // The auto-assigned focus is persisted.
    assert_eq!(world.registry.focus(&EditorId::new("alice")), Some("gate"));
    assert!(world.registry.is_dirty());
}

#[test]
fn join_without_barriers_sends_empty_syncs() {
    let mut world = World::new();
    world.registry.remove("gate");
    world.registry.drain_changes();

    let out = world.join(ALICE, "alice");
    assert_eq!(barrier_sync(&out[1]), (SyncScope::Active, "", false, Some(ALICE)));
    assert_eq!(barrier_sync(&out[2]), (SyncScope::Focus, "", false, Some(ALICE)));
}

#[test]
fn duplicate_username_is_kicked() {
    let mut world = World::new();
    world.join(ALICE, "alice");
    let out = world.join(BOB, "alice");
    assert!(matches!(&out[..], [ServerOutbound::Kick { client: BOB, .. }]));
    assert_eq!(world.sessions.len(), 1);
}

#[test]
fn cell_edit_on_active_barrier_reaches_everyone() {
    let mut world = World::new();
    world.join(ALICE, "alice");
    world.join(BOB, "bob");
    world.registry.set_focus(&EditorId::new("bob"), "gate");
    world.sync();

    let out = world.send(
        ALICE,
        EditCell {
            target: None,
            x: 4,
            y: 0,
            z: 4,
            solid: true,
        },
    );
    assert!(feedback_ok(&out));
    assert!(world.registry.get("gate").unwrap().is_solid(4, 0, 4));

    let syncs = world.sync();
    assert_eq!(syncs.len(), 3);
    assert_eq!(barrier_sync(&syncs[0]), (SyncScope::Active, "gate", true, None));
    assert_eq!(barrier_sync(&syncs[1]), (SyncScope::Focus, "gate", true, Some(ALICE)));
    assert_eq!(barrier_sync(&syncs[2]), (SyncScope::Focus, "gate", true, Some(BOB)));
}

#[test]
fn repeated_edit_reports_no_change_and_syncs_nothing() {
    let mut world = World::new();
    world.join(ALICE, "alice");
    world.sync();

    let out = world.send(
        ALICE,
        packet::EditColumn {
            target: None,
            x: 2,
            z: 0,
            solid: true,
        },
    );
    assert!(feedback_ok(&out));
    assert!(world.sync().is_empty());
}

#[test]
fn out_of_bounds_and_unknown_targets_fail() {
    let mut world = World::new();
    world.join(ALICE, "alice");

    let out = world.send(
        ALICE,
        EditCell {
            target: None,
            x: 5,
            y: 0,
            z: 0,
            solid: true,
        },
    );
    assert!(!feedback_ok(&out));

    let out = world.send(
        ALICE,
        EditCell {
            target: Some("nope".into()),
            x: 0,
            y: 0,
            z: 0,
            solid: true,
        },
    );
    assert!(!feedback_ok(&out));
    assert!(world.sync().is_empty());
}

#[test]
fn removing_a_focused_barrier_refocuses_its_editors() {
    let mut world = World::new();
    world.join(ALICE, "alice");
    let out = world.send(
        ALICE,
        packet::CreateBarrier {
            name: "side".into(),
            origin_x: 10.0,
            origin_z: 0.0,
            width: 3,
            depth: 3,
            height: 3,
        },
    );
    assert!(feedback_ok(&out));
    assert_eq!(world.registry.focus(&EditorId::new("alice")), Some("side"));
    world.sync();

    let out = world.send(
        ALICE,
        packet::RemoveBarrier {
            name: "side".into(),
        },
    );
    assert!(feedback_ok(&out));

    let syncs = world.sync();
    assert_eq!(syncs.len(), 2);
    match sent_packet(&syncs[0]) {
        (Packet::SyncBarrierNames(names), None) => assert_eq!(names.names, vec!["gate"]),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(barrier_sync(&syncs[1]), (SyncScope::Focus, "gate", true, Some(ALICE)));
}

#[test]
fn removing_the_active_barrier_clears_it_everywhere() {
    let mut world = World::new();
    world.join(ALICE, "alice");
    world.sync();

    world.send(
        ALICE,
        packet::RemoveBarrier {
            name: "gate".into(),
        },
    );
    let syncs = world.sync();
    assert_eq!(syncs.len(), 3);
    assert_eq!(barrier_sync(&syncs[1]), (SyncScope::Active, "", false, None));
    assert_eq!(barrier_sync(&syncs[2]), (SyncScope::Focus, "", false, Some(ALICE)));
}

#[test]
fn clearing_removes_every_barrier_and_resyncs() {
    let mut world = World::new();
    world.join(ALICE, "alice");
    world.send(
        ALICE,
        packet::CreateBarrier {
            name: "side".into(),
            origin_x: 10.0,
            origin_z: 0.0,
            width: 3,
            depth: 3,
            height: 3,
        },
    );
    world.sync();

    let out = world.send(ALICE, packet::ClearBarriers {});
    assert!(feedback_ok(&out));
    assert_eq!(feedback_message(&out), "Removed 2 barriers");
    assert!(world.registry.is_empty());
    assert!(world.registry.is_dirty());

    let syncs = world.sync();
    assert_eq!(syncs.len(), 3);
    match sent_packet(&syncs[0]) {
        (Packet::SyncBarrierNames(names), None) => assert!(names.names.is_empty()),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(barrier_sync(&syncs[1]), (SyncScope::Active, "", false, None));
    assert_eq!(barrier_sync(&syncs[2]), (SyncScope::Focus, "", false, Some(ALICE)));

    let out = world.send(ALICE, packet::ClearBarriers {});
    assert_eq!(feedback_message(&out), "No barriers to remove");
}

#[test]
fn create_messages_list_width_depth_height() {
    let mut world = World::new();
    world.join(ALICE, "alice");
    let mut create = packet::CreateBarrier {
        name: "slab".into(),
        origin_x: 0.0,
        origin_z: 20.0,
        width: 3,
        depth: 4,
        height: 5,
    };
    let out = world.send(ALICE, create.clone());
    assert_eq!(feedback_message(&out), "Created barrier 'slab' (3x4x5) and focused it");

    create.width = 0;
    let out = world.send(ALICE, create);
    assert_eq!(feedback_message(&out), "Invalid barrier bounds 0x4x5");
}

#[test]
fn deactivating_broadcasts_an_empty_active_sync() {
    let mut world = World::new();
    world.join(ALICE, "alice");
    world.sync();

    let out = world.send(ALICE, packet::SetActiveBarrier { name: None });
    assert!(feedback_ok(&out));
    let syncs = world.sync();
    assert_eq!(syncs.len(), 2);
    assert_eq!(barrier_sync(&syncs[1]), (SyncScope::Active, "", false, None));

    let out = world.send(
        ALICE,
        packet::SetActiveBarrier {
            name: Some("missing".into()),
        },
    );
    assert!(!feedback_ok(&out));
}

#[test]
fn move_into_wall_is_corrected() {
    let mut world = World::new();
    world.join(ALICE, "alice");

    let first = world.send(
        ALICE,
        packet::PlayerMove {
            x: 0.5,
            y: 1.0,
            z: 2.5,
            on_ground: true,
        },
    );
    assert!(first.is_empty());

    let out = world.send(
        ALICE,
        packet::PlayerMove {
            x: 4.5,
            y: 1.0,
            z: 2.5,
            on_ground: true,
        },
    );
    assert_eq!(out.len(), 1);
    let (pos, reset) = correction_of(&out[0]);
    assert!(!reset);
    assert_near(pos, DVec3::new(1.65, 1.0, 2.5));

    let body = world.sessions.get(ALICE).unwrap().body.unwrap();
    assert_near(body.pos, DVec3::new(1.65, 1.0, 2.5));
}

#[test]
fn clear_move_is_accepted() {
    let mut world = World::new();
    world.join(ALICE, "alice");
    world.send(
        ALICE,
        packet::PlayerMove {
            x: 0.5,
            y: 1.0,
            z: 0.5,
            on_ground: true,
        },
    );
    let out = world.send(
        ALICE,
        packet::PlayerMove {
            x: 1.5,
            y: 1.0,
            z: 4.5,
            on_ground: true,
        },
    );
    assert!(out.is_empty());
}

#[test]
fn teleport_through_wall_bounces_back() {
    let mut world = World::new();
    world.join(ALICE, "alice");
    world.send(
        ALICE,
        packet::PlayerMove {
            x: 0.5,
            y: 1.0,
            z: 2.5,
            on_ground: true,
        },
    );

    let out = world.send(
        ALICE,
        packet::TeleportRequest {
            x: 4.5,
            y: 1.0,
            z: 2.5,
            relative: RelativeFlags::absolute(),
        },
    );
    let (pos, reset) = correction_of(&out[0]);
    assert!(reset);
    assert_near(pos, DVec3::new(1.5, 1.0, 2.5));
}

#[test]
fn relative_teleport_short_of_wall_is_kept() {
    let mut world = World::new();
    world.join(ALICE, "alice");
    world.send(
        ALICE,
        packet::PlayerMove {
            x: 0.5,
            y: 1.0,
            z: 2.5,
            on_ground: true,
        },
    );

    let out = world.send(
        ALICE,
        packet::TeleportRequest {
            x: 1.0,
            y: 0.0,
            z: 0.0,
            relative: RelativeFlags(RelativeFlags::X | RelativeFlags::Y | RelativeFlags::Z),
        },
    );
    let (pos, _) = correction_of(&out[0]);
    assert_near(pos, DVec3::new(1.5, 1.0, 2.5));
}

#[test]
fn body_inside_wall_is_pushed_out() {
    let mut world = World::new();
    world.join(ALICE, "alice");
    world.sessions.get_mut(ALICE).unwrap().body = Some(BodyState {
        pos: DVec3::new(2.5, 1.0, 2.5),
        vel: DVec3::new(0.2, -0.1, 0.0),
    });

    let out = resolve_penetrations(&world.registry, &mut world.sessions, &mut world.guard);
    assert_eq!(out.len(), 1);
    let (pos, reset) = correction_of(&out[0]);
    assert!(reset);
    assert_near(pos, DVec3::new(1.697, 1.0, 2.5));

    let body = world.sessions.get(ALICE).unwrap().body.unwrap();
    assert_eq!(body.vel, DVec3::new(0.0, -0.1, 0.0));

    // Already clear: nothing further.
    let out = resolve_penetrations(&world.registry, &mut world.sessions, &mut world.guard);
    assert!(out.is_empty());
}

#[test]
fn tool_places_in_front_of_face_and_breaks_it_again() {
    let mut world = World::new();
    world.join(ALICE, "alice");
    let click = |action| ToolUse {
        eye_x: 0.5,
        eye_y: 1.5,
        eye_z: 2.5,
        look_x: 1.0,
        look_y: 0.0,
        look_z: 0.0,
        action,
    };

    let out = world.send(ALICE, click(ToolAction::Place));
    assert!(feedback_ok(&out));
    assert!(world.registry.get("gate").unwrap().is_solid(1, 1, 2));

    let out = world.send(ALICE, click(ToolAction::Break));
    assert!(feedback_ok(&out));
    assert!(!world.registry.get("gate").unwrap().is_solid(1, 1, 2));
    assert!(world.registry.get("gate").unwrap().is_solid(2, 1, 2));
}

#[test]
fn tool_without_any_barrier_fails() {
    let mut world = World::new();
    world.registry.remove("gate");
    world.join(ALICE, "alice");
    let out = world.send(
        ALICE,
        ToolUse {
            eye_x: 0.0,
            eye_y: 0.0,
            eye_z: 0.0,
            look_x: 1.0,
            look_y: 0.0,
            look_z: 0.0,
            action: ToolAction::Break,
        },
    );
    assert!(!feedback_ok(&out));
}

#[test]
fn leaving_forgets_the_session() {
    let mut world = World::new();
    world.join(ALICE, "alice");
    let out = world.inbound(ServerInbound::Left { client: ALICE });
    assert!(out.is_empty());
    assert!(world.sessions.is_empty());
    assert!(world.send(ALICE, packet::SetBarrierFocus { name: "gate".into() }).is_empty());
}

#[test]
fn store_round_trip_keeps_barriers_active_and_focus() {
    let mut world = World::new();
    world.join(ALICE, "alice");

    let json = encode_store(&world.registry).unwrap();
    let restored = decode_store(&json, 320).unwrap();
    assert_eq!(restored.active_name(), Some("gate"));
    assert_eq!(restored.focus(&EditorId::new("alice")), Some("gate"));
    assert_eq!(restored.get("gate"), world.registry.get("gate"));
    assert!(!restored.is_dirty());
}

#[test]
fn legacy_record_is_expanded_to_full_height() {
    let raw = r#"{
        "barriers": {
            "old": { "x": 1.5, "z": -2.0, "w": 2, "d": 2, "grid": "AAEAAA==" }
        },
        "active": "old"
    }"#;
    let registry = decode_store(raw, 3).unwrap();
    let grid = registry.get("old").unwrap();
    assert_eq!(grid.height(), 3);
    assert_eq!(grid.solid_count(), 3);
    for y in 0..3 {
        assert!(grid.is_solid(1, y, 0));
    }
    assert_eq!(registry.active_name(), Some("old"));
}

#[test]
fn bad_records_and_dangling_references_are_dropped() {
    let raw = r#"{
        "barriers": {
            "short": { "x": 0.0, "z": 0.0, "w": 2, "d": 2, "h": 2, "grid": "AAA=" },
            "fine": { "x": 0.0, "z": 0.0, "w": 1, "d": 1, "h": 1, "grid": "AQ==" }
        },
        "active": "short",
        "focus": { "alice": "short", "bob": "fine" }
    }"#;
    let registry = decode_store(raw, 3).unwrap();
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["fine"]);
    assert_eq!(registry.active_name(), None);
    assert_eq!(registry.focus(&EditorId::new("alice")), None);
    assert_eq!(registry.focus(&EditorId::new("bob")), Some("fine"));
    assert!(registry.get("fine").unwrap().is_solid(0, 0, 0));
}

#[test]
fn malformed_store_is_an_error() {
    assert!(decode_store("{ not json", 3).is_err());
}

#[test]
fn save_then_load_from_disk() {
    let dir = std::env::temp_dir().join(format!("aw-server-store-{}", std::process::id()));
    let path = dir.join("barriers.json");
    let _ = std::fs::remove_dir_all(&dir);

    let missing = load_registry(&path, 3).unwrap();
    assert!(missing.is_empty());

    let world = World::new();
    save_registry(&path, &world.registry).unwrap();
    assert!(!dir.join("barriers.json.tmp").exists());

    let loaded = load_registry(&path, 3).unwrap();
    assert_eq!(loaded.get("gate"), world.registry.get("gate"));
    assert_eq!(loaded.active_name(), Some("gate"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn pending_edits_are_saved_on_exit() {
    let dir = std::env::temp_dir().join(format!("aw-server-exit-{}", std::process::id()));
    let path = dir.join("barriers.json");
    let _ = std::fs::remove_dir_all(&dir);

    let mut registry = BarrierRegistry::new();
    assert!(registry.create("late", 0.0, 0.0, 2, 2, 2));
    let mut app = App::new();
    app.add_event::<AppExit>()
        .insert_resource(StorePath(path.clone()))
        .insert_resource(registry)
        .add_systems(Last, save_on_exit);

    app.update();
    assert!(!path.exists());

    app.world_mut().send_event(AppExit::Success);
    app.update();
    assert!(!app.world().resource::<BarrierRegistry>().is_dirty());
    let loaded = load_registry(&path, 3).unwrap();
    assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["late"]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn config_fills_missing_fields_with_defaults() {
    let raw = r#"
        bind = "127.0.0.1:4000"

        [collision]
        thick_rays = true

        [editing]
        ground_level = 64
    "#;
    let config = ServerConfig::from_toml(std::path::Path::new("server.toml"), raw).unwrap();
    assert_eq!(config.bind, "127.0.0.1:4000");
    assert!(config.collision.thick_rays);
    assert_eq!(config.collision.clearance_padding, 0.35);
    assert_eq!(config.editing.ground_level, Some(64));
    assert_eq!(config.resync_interval_secs, 30.0);
}

#[test]
fn config_rejects_nonsense() {
    let err = ServerConfig::from_toml(std::path::Path::new("server.toml"), "tick_rate_hz = 0.0")
        .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "tick_rate_hz", .. }));

    let err = ServerConfig::from_toml(std::path::Path::new("server.toml"), "legacy_wall_height = 0")
        .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "legacy_wall_height", .. }));

    let err = ServerConfig::from_toml(std::path::Path::new("server.toml"), "write_timeout_secs = -1.0")
        .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "write_timeout_secs", .. }));
}
