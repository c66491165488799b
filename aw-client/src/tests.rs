use aw_protocol::protocol::packet::{self, Packet, RelativeFlags, SyncScope, ToolAction};
use aw_sim::VoxelGrid;
use aw_utils::{AppState, ApplicationState, FromNet, FromNetMessage, ToNet, ToNetMessage};
use bevy::math::DVec3;
use bevy::prelude::*;
use clap::Parser;
use crossbeam::channel::{Receiver, Sender, unbounded};

use crate::message_handler::{PendingWalk, handle_messages};
use crate::replica::BarrierReplica;
use crate::script::{Command, Script, WalkPlan, expects_feedback};
use crate::sim::{CurrentInput, DebugStats, SimState};

fn grid() -> VoxelGrid {
    let mut grid = VoxelGrid::new(0.0, 0.0, 3, 3, 3).unwrap();
    grid.set_solid(1, 1, 1, true);
    grid
}

#[test]
fn replica_replaces_and_clears_slots() {
    let mut replica = BarrierReplica::default();
    replica.apply_names(vec!["a".into(), "b".into()]);
    replica.apply_sync(SyncScope::Active, "a".into(), Some(grid()));
    replica.apply_sync(SyncScope::Focus, "b".into(), Some(grid()));

    assert_eq!(replica.names(), ["a".to_string(), "b".to_string()]);
    assert_eq!(replica.active().unwrap().name, "a");
    assert_eq!(replica.focus().unwrap().name, "b");
    assert_eq!(replica.active_grid().unwrap().solid_count(), 1);

    replica.apply_sync(SyncScope::Active, String::new(), None);
    assert!(replica.active().is_none());
    assert!(replica.focus().is_some());
    assert_eq!(replica.sync_count(), 3);

    replica.clear();
    assert!(replica.names().is_empty());
    assert!(replica.focus().is_none());
}

#[test]
fn walk_plan_keeps_start_height() {
    let plan = Command::Walk {
        from_x: 0.5,
        from_y: 64.0,
        from_z: 2.5,
        to_x: 4.5,
        to_z: 2.5,
        speed: 4.3,
    }
    .plan();
    assert!(plan.packets.is_empty());
    assert!(plan.exit_when_done);
    let walk = plan.walk.unwrap();
    assert_eq!(walk.start, DVec3::new(0.5, 64.0, 2.5));
    assert_eq!(walk.target, DVec3::new(4.5, 64.0, 2.5));
}

#[test]
fn watch_never_exits_by_itself() {
    let plan = Command::Watch.plan();
    assert!(plan.packets.is_empty());
    assert!(plan.walk.is_none());
    assert!(!plan.exit_when_done);
}

#[test]
fn relative_teleport_sets_every_flag() {
    let plan = Command::Teleport {
        x: 1.0,
        y: 0.0,
        z: -2.0,
        relative: true,
    }
    .plan();
    let Packet::TeleportRequest(req) = &plan.packets[0] else {
        panic!("expected teleport, got {:?}", plan.packets);
    };
    assert!(req.relative.contains(RelativeFlags::X));
    assert!(req.relative.contains(RelativeFlags::Y));
    assert!(req.relative.contains(RelativeFlags::Z));
    assert_eq!(req.z, -2.0);
}

#[test]
fn tool_break_flag_maps_to_break_action() {
    let plan = Command::Tool {
        eye_x: 0.0,
        eye_y: 1.6,
        eye_z: 0.0,
        look_x: 1.0,
        look_y: 0.0,
        look_z: 0.0,
        remove: true,
    }
    .plan();
    let Packet::ToolUse(req) = &plan.packets[0] else {
        panic!("expected tool use, got {:?}", plan.packets);
    };
    assert_eq!(req.action, ToolAction::Break);
}

#[derive(Parser)]
struct Harness {
    #[command(subcommand)]
    command: Command,
}

#[test]
fn negative_coordinates_parse() {
    let cli = Harness::try_parse_from(["aw-client", "create", "gate", "-10", "-4.5", "3", "2", "5"])
        .unwrap();
    assert_eq!(
        cli.command,
        Command::Create {
            name: "gate".into(),
            x: -10.0,
            z: -4.5,
            width: 3,
            depth: 2,
            height: 5,
        }
    );
}

#[test]
fn clear_all_sends_one_request_and_waits_for_feedback() {
    let cli = Harness::try_parse_from(["aw-client", "clear-all"]).unwrap();
    assert_eq!(cli.command, Command::ClearAll);
    let plan = cli.command.plan();
    assert_eq!(plan.packets, vec![Packet::from(packet::ClearBarriers {})]);
    assert!(expects_feedback(&plan.packets[0]));
    assert!(plan.exit_when_done);
}

#[test]
fn script_waits_for_every_answer() {
    let mut script = Script::new(
        vec![
            packet::SetActiveBarrier {
                name: Some("a".into()),
            }
            .into(),
            packet::TeleportRequest {
                x: 0.0,
                y: 0.0,
                z: 0.0,
                relative: RelativeFlags::absolute(),
            }
            .into(),
        ],
        true,
    );
    assert!(!script.finished());
    let sent = script.take_pending();
    assert_eq!(sent.len(), 2);
    assert!(expects_feedback(&sent[0]));
    assert!(!expects_feedback(&sent[1]));
    assert!(!script.finished());

    script.on_feedback();
    assert!(!script.finished());
    script.on_correction();
    assert!(script.finished());
    assert!(script.take_pending().is_empty());
}

struct Client {
    app: App,
    from_net: Sender<FromNetMessage>,
    to_net: Receiver<ToNetMessage>,
}

fn client(walk: Option<WalkPlan>) -> Client {
    let (from_tx, from_rx) = unbounded();
    let (to_tx, to_rx) = unbounded();
    let mut app = App::new();
    app.insert_resource(FromNet(from_rx))
        .insert_resource(ToNet(to_tx))
        .insert_resource(AppState(ApplicationState::Connecting))
        .insert_resource(BarrierReplica::default())
        .insert_resource(SimState::default())
        .insert_resource(CurrentInput::default())
        .insert_resource(DebugStats::default())
        .insert_resource(Script::default())
        .insert_resource(PendingWalk(walk))
        .add_systems(Update, handle_messages);
    Client {
        app,
        from_net: from_tx,
        to_net: to_rx,
    }
}

#[test]
fn connect_starts_pending_walk() {
    let mut client = client(Some(WalkPlan {
        start: DVec3::new(0.5, 1.0, 2.5),
        target: DVec3::new(4.5, 1.0, 2.5),
        speed: 4.0,
    }));
    client.from_net.send(FromNetMessage::Connected).unwrap();
    client.app.update();

    let world = client.app.world();
    assert_eq!(world.resource::<AppState>().0, ApplicationState::Connected);
    let sim = world.resource::<SimState>();
    assert!(sim.ready);
    assert_eq!(sim.current.pos, DVec3::new(0.5, 1.0, 2.5));
    assert_eq!(
        world.resource::<CurrentInput>().0.target,
        Some(DVec3::new(4.5, 1.0, 2.5))
    );
    match client.to_net.try_recv() {
        Ok(ToNetMessage::PlayerMove { x, z, .. }) => {
            assert_eq!(x, 0.5);
            assert_eq!(z, 2.5);
        }
        _ => panic!("expected initial move"),
    }
}

#[test]
fn syncs_and_corrections_update_resources() {
    let mut client = client(None);
    client
        .from_net
        .send(FromNetMessage::BarrierNames(vec!["gate".into()]))
        .unwrap();
    client
        .from_net
        .send(FromNetMessage::BarrierSync {
            scope: SyncScope::Active,
            name: "gate".into(),
            grid: Some(grid()),
        })
        .unwrap();
    client
        .from_net
        .send(FromNetMessage::PositionCorrection {
            x: 1.0,
            y: 2.0,
            z: 3.0,
            reset_velocity: true,
        })
        .unwrap();
    client
        .from_net
        .send(FromNetMessage::PositionCorrection {
            x: 1.5,
            y: 2.0,
            z: 3.0,
            reset_velocity: true,
        })
        .unwrap();
    client.app.update();

    let world = client.app.world();
    let replica = world.resource::<BarrierReplica>();
    assert_eq!(replica.names(), ["gate".to_string()]);
    assert_eq!(replica.active().unwrap().name, "gate");
    let sim = world.resource::<SimState>();
    assert!(sim.ready);
    assert_eq!(sim.current.pos, DVec3::new(1.5, 2.0, 3.0));
    assert_eq!(world.resource::<DebugStats>().corrections, 1);
}
