use aw_protocol::protocol::packet::{
    CreateBarrier, EditCell, EditColumn, EditLine, ResizeBarrier, SetActiveBarrier,
    SetBarrierFocus,
};
use aw_sim::registry::is_valid_name;
use aw_sim::{BarrierRegistry, EditOutcome, EditorId};
use tracing::info;

/// Result of an editor request, reported back as `EditFeedback`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub ok: bool,
    pub message: String,
}

impl Feedback {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

pub fn describe(outcome: EditOutcome, name: &str, what: &str) -> Feedback {
    match outcome {
        EditOutcome::Changed => Feedback::ok(format!("{what} in '{name}'")),
        EditOutcome::Unchanged => Feedback::ok(format!("Nothing to change in '{name}'")),
        EditOutcome::UnknownBarrier => Feedback::fail(format!("No barrier named '{name}'")),
        EditOutcome::OutOfBounds => Feedback::fail(format!("Outside the bounds of '{name}'")),
    }
}

/// Explicit target, else the editor's focus, else the active barrier.
fn target_for(
    registry: &BarrierRegistry,
    editor: &EditorId,
    target: Option<String>,
) -> Result<String, Feedback> {
    target
        .or_else(|| registry.edit_target(editor))
        .ok_or_else(|| Feedback::fail("No barrier selected; focus or activate one first"))
}

pub fn create(registry: &mut BarrierRegistry, editor: &EditorId, req: CreateBarrier) -> Feedback {
    if !is_valid_name(&req.name) {
        return Feedback::fail(format!("Invalid barrier name {:?}", req.name));
    }
    if !registry.create(
        &req.name,
        req.origin_x,
        req.origin_z,
        req.width,
        req.depth,
        req.height,
    ) {
        return Feedback::fail(format!(
            "Invalid barrier bounds {}x{}x{}",
            req.width, req.depth, req.height
        ));
    }
    registry.set_focus(editor, &req.name);
    info!(%editor, name = %req.name, w = req.width, d = req.depth, h = req.height, "barrier created");
    Feedback::ok(format!(
        "Created barrier '{}' ({}x{}x{}) and focused it",
        req.name, req.width, req.depth, req.height
    ))
}

pub fn remove(registry: &mut BarrierRegistry, editor: &EditorId, name: &str) -> Feedback {
    if registry.remove(name) {
        info!(%editor, %name, "barrier removed");
        Feedback::ok(format!("Removed barrier '{name}'"))
    } else {
        Feedback::fail(format!("No barrier named '{name}'"))
    }
}

pub fn clear(registry: &mut BarrierRegistry, editor: &EditorId) -> Feedback {
    let removed = registry.clear();
    info!(%editor, removed, "barriers cleared");
    match removed {
        0 => Feedback::ok("No barriers to remove"),
        1 => Feedback::ok("Removed 1 barrier"),
        n => Feedback::ok(format!("Removed {n} barriers")),
    }
}

pub fn set_active(registry: &mut BarrierRegistry, editor: &EditorId, req: SetActiveBarrier) -> Feedback {
    match req.name.as_deref() {
        Some(name) if registry.set_active(Some(name)) => {
            info!(%editor, %name, "barrier activated");
            Feedback::ok(format!("Activated barrier '{name}'"))
        }
        Some(name) => Feedback::fail(format!("No barrier named '{name}'")),
        None => {
            registry.set_active(None);
            info!(%editor, "barrier deactivated");
            Feedback::ok("Barrier deactivated")
        }
    }
}

pub fn set_focus(registry: &mut BarrierRegistry, editor: &EditorId, req: SetBarrierFocus) -> Feedback {
    if registry.set_focus(editor, &req.name) {
        Feedback::ok(format!("Now editing '{}'", req.name))
    } else {
        Feedback::fail(format!("No barrier named '{}'", req.name))
    }
}

pub fn resize(registry: &mut BarrierRegistry, editor: &EditorId, req: ResizeBarrier) -> Feedback {
    let name = match target_for(registry, editor, req.target) {
        Ok(name) => name,
        Err(feedback) => return feedback,
    };
    match registry.resize(
        &name,
        req.origin_x,
        req.origin_z,
        req.width,
        req.depth,
        req.height,
    ) {
        EditOutcome::OutOfBounds => Feedback::fail(format!(
            "Invalid barrier bounds {}x{}x{}",
            req.width, req.depth, req.height
        )),
        outcome => describe(outcome, &name, "Resized and cleared"),
    }
}

pub fn edit_cell(registry: &mut BarrierRegistry, editor: &EditorId, req: EditCell) -> Feedback {
    let name = match target_for(registry, editor, req.target) {
        Ok(name) => name,
        Err(feedback) => return feedback,
    };
    let outcome = registry.set_cell(&name, req.x, req.y, req.z, req.solid);
    let what = format!(
        "{} cell ({}, {}, {})",
        if req.solid { "Filled" } else { "Cleared" },
        req.x,
        req.y,
        req.z
    );
    describe(outcome, &name, &what)
}

pub fn edit_column(registry: &mut BarrierRegistry, editor: &EditorId, req: EditColumn) -> Feedback {
    let name = match target_for(registry, editor, req.target) {
        Ok(name) => name,
        Err(feedback) => return feedback,
    };
    let outcome = registry.set_column(&name, req.x, req.z, req.solid);
    let what = format!(
        "{} column ({}, {})",
        if req.solid { "Filled" } else { "Cleared" },
        req.x,
        req.z
    );
    describe(outcome, &name, &what)
}

pub fn edit_line(registry: &mut BarrierRegistry, editor: &EditorId, req: EditLine) -> Feedback {
    let name = match target_for(registry, editor, req.target) {
        Ok(name) => name,
        Err(feedback) => return feedback,
    };
    let outcome = registry.draw_line(&name, req.x1, req.z1, req.x2, req.z2, req.solid);
    let what = format!(
        "{} line ({}, {}) -> ({}, {})",
        if req.solid { "Filled" } else { "Cleared" },
        req.x1,
        req.z1,
        req.x2,
        req.z2
    );
    describe(outcome, &name, &what)
}
