use aw_protocol::protocol::packet::{ToolAction, ToolUse};
use aw_sim::pick::pick_cell;
use aw_sim::{BarrierRegistry, EditOutcome, EditorId, FlatGround, NoTerrain, TerrainRaycast};
use bevy::math::DVec3;

use crate::config::EditingSettings;
use crate::editing::{Feedback, describe};

pub fn terrain(settings: &EditingSettings) -> Box<dyn TerrainRaycast> {
    match settings.ground_level {
        Some(surface_y) => Box::new(FlatGround { surface_y }),
        None => Box::new(NoTerrain),
    }
}

/// Applies a place/break tool click against the editor's focus (or the
/// active barrier).
pub fn use_tool(
    registry: &mut BarrierRegistry,
    editor: &EditorId,
    settings: &EditingSettings,
    terrain: &dyn TerrainRaycast,
    req: &ToolUse,
) -> Feedback {
    let Some(name) = registry.edit_target(editor) else {
        return Feedback::fail("No barrier selected; focus or activate one first");
    };
    let Some(grid) = registry.get(&name) else {
        return Feedback::fail(format!("No barrier named '{name}'"));
    };

    let eye = DVec3::new(req.eye_x, req.eye_y, req.eye_z);
    let look = DVec3::new(req.look_x, req.look_y, req.look_z);
    let target = pick_cell(grid, eye, look, settings.reach, terrain);

    let (cell, solid) = match req.action {
        ToolAction::Break => match target.removal() {
            Some(cell) => (cell, false),
            None => return Feedback::fail("No barrier cell in reach"),
        },
        ToolAction::Place => match target.placement(grid) {
            Some(cell) => (cell, true),
            None => return Feedback::fail("Nothing in reach to place against"),
        },
    };

    match registry.set_cell(&name, cell.x, cell.y, cell.z, solid) {
        EditOutcome::Unchanged if solid => Feedback::fail("That cell is already solid"),
        EditOutcome::OutOfBounds => Feedback::fail(format!("Outside the bounds of '{name}'")),
        outcome => {
            let verb = if solid { "Placed" } else { "Broke" };
            let what = format!("{verb} cell ({}, {}, {})", cell.x, cell.y, cell.z);
            describe(outcome, &name, &what)
        }
    }
}

