use aw_sim::{BodySize, VoxelGrid};
use bevy::math::DVec3;

use super::predict::{simulate_tick, walk_finished};
use super::reconcile::reconcile;
use super::types::{PlayerSimState, WalkInput};
use super::MAX_STALLED_TICKS;

const DT: f64 = 0.05;

fn wall_grid() -> VoxelGrid {
    let mut grid = VoxelGrid::new(0.0, 0.0, 5, 5, 5).unwrap();
    for z in 0..5 {
        grid.set_column(2, z, true);
    }
    grid
}

fn walk(grid: Option<&VoxelGrid>, ticks: usize) -> (PlayerSimState, u32) {
    let input = WalkInput {
        target: Some(DVec3::new(4.5, 1.0, 2.5)),
        speed: 4.0,
    };
    let mut state = PlayerSimState {
        pos: DVec3::new(0.5, 1.0, 2.5),
        ..Default::default()
    };
    let mut stalled = 0;
    for _ in 0..ticks {
        let next = simulate_tick(&state, &input, DT, grid, BodySize::default());
        if (next.pos - state.pos).length() < 1e-6 {
            stalled += 1;
        } else {
            stalled = 0;
        }
        state = next;
    }
    (state, stalled)
}

#[test]
fn open_walk_reaches_target() {
    let (state, _) = walk(None, 40);
    assert!((state.pos - DVec3::new(4.5, 1.0, 2.5)).length() < 1e-9);
    assert_eq!(state.vel, DVec3::ZERO);
}

#[test]
fn replicated_wall_stops_prediction() {
    let grid = wall_grid();
    let (state, stalled) = walk(Some(&grid), 60);
    assert!((state.pos.x - 1.7).abs() < 1e-9, "stopped at {:?}", state.pos);
    assert!((state.pos.z - 2.5).abs() < 1e-9);
    assert!(stalled >= MAX_STALLED_TICKS);

    let input = WalkInput {
        target: Some(DVec3::new(4.5, 1.0, 2.5)),
        speed: 4.0,
    };
    assert!(walk_finished(&state, &input, stalled));
    assert!(!walk_finished(&state, &input, 0));
}

#[test]
fn idle_input_keeps_position() {
    let state = PlayerSimState {
        pos: DVec3::new(1.0, 2.0, 3.0),
        vel: DVec3::new(0.1, 0.0, 0.0),
        on_ground: true,
    };
    let next = simulate_tick(&state, &WalkInput::default(), DT, None, BodySize::default());
    assert_eq!(next.pos, state.pos);
    assert_eq!(next.vel, DVec3::ZERO);
}

#[test]
fn tiny_corrections_are_ignored() {
    let mut state = PlayerSimState {
        pos: DVec3::new(1.0, 1.0, 1.0),
        ..Default::default()
    };
    assert!(reconcile(&mut state, DVec3::new(1.0005, 1.0, 1.0), false).is_none());
    assert_eq!(state.pos, DVec3::new(1.0, 1.0, 1.0));
}

#[test]
fn server_correction_wins() {
    let mut state = PlayerSimState {
        pos: DVec3::new(2.5, 1.0, 2.5),
        vel: DVec3::new(0.2, 0.0, 0.0),
        on_ground: true,
    };
    let result = reconcile(&mut state, DVec3::new(1.697, 1.0, 2.5), true).unwrap();
    assert!(!result.hard_teleport);
    assert!((result.correction.x + 0.803).abs() < 1e-9);
    assert_eq!(state.pos, DVec3::new(1.697, 1.0, 2.5));
    assert_eq!(state.vel, DVec3::ZERO);

    let far = reconcile(&mut state, DVec3::new(50.0, 1.0, 2.5), false).unwrap();
    assert!(far.hard_teleport);
}
