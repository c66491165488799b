use std::collections::VecDeque;

use aw_protocol::protocol::packet::{self, Packet, RelativeFlags, ToolAction};
use aw_utils::{AppState, ApplicationState, ToNet, ToNetMessage};
use bevy::math::DVec3;
use bevy::prelude::*;
use clap::Subcommand;
use tracing::info;

use crate::sim::CurrentInput;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Stay connected and log every barrier sync.
    Watch,
    /// Walk in a straight line, predicting collisions against the active barrier.
    Walk {
        #[arg(allow_hyphen_values = true)]
        from_x: f64,
        #[arg(allow_hyphen_values = true)]
        from_y: f64,
        #[arg(allow_hyphen_values = true)]
        from_z: f64,
        #[arg(allow_hyphen_values = true)]
        to_x: f64,
        #[arg(allow_hyphen_values = true)]
        to_z: f64,
        /// Blocks per second.
        #[arg(long, default_value_t = 4.3)]
        speed: f64,
    },
    /// Ask the server to teleport us.
    Teleport {
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
        #[arg(allow_hyphen_values = true)]
        z: f64,
        /// Treat all three coordinates as offsets from the current position.
        #[arg(long)]
        relative: bool,
    },
    /// Create (or replace) a barrier and focus it.
    Create {
        name: String,
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        z: f64,
        width: i32,
        depth: i32,
        height: i32,
    },
    Remove {
        name: String,
    },
    /// Remove every barrier.
    ClearAll,
    /// Make a barrier the one that collides for everyone.
    Activate {
        name: String,
    },
    Deactivate,
    /// Choose which barrier your edits apply to.
    Focus {
        name: String,
    },
    /// Set one cell (local coordinates).
    Cell {
        x: i32,
        y: i32,
        z: i32,
        #[arg(long)]
        clear: bool,
        #[arg(long)]
        target: Option<String>,
    },
    /// Set every layer of one column.
    Column {
        x: i32,
        z: i32,
        #[arg(long)]
        clear: bool,
        #[arg(long)]
        target: Option<String>,
    },
    /// Set the columns on a line between two local (x, z) points.
    Line {
        x1: i32,
        z1: i32,
        x2: i32,
        z2: i32,
        #[arg(long)]
        clear: bool,
        #[arg(long)]
        target: Option<String>,
    },
    /// Move and reallocate a barrier; its cells are cleared.
    Resize {
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        z: f64,
        width: i32,
        depth: i32,
        height: i32,
        #[arg(long)]
        target: Option<String>,
    },
    /// Click with the editing tool from an eye position along a look vector.
    Tool {
        #[arg(allow_hyphen_values = true)]
        eye_x: f64,
        #[arg(allow_hyphen_values = true)]
        eye_y: f64,
        #[arg(allow_hyphen_values = true)]
        eye_z: f64,
        #[arg(allow_hyphen_values = true)]
        look_x: f64,
        #[arg(allow_hyphen_values = true)]
        look_y: f64,
        #[arg(allow_hyphen_values = true)]
        look_z: f64,
        /// Break the picked cell instead of placing in front of it.
        #[arg(long = "break")]
        remove: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkPlan {
    pub start: DVec3,
    pub target: DVec3,
    pub speed: f64,
}

/// What a command asks of the client once connected.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub packets: Vec<Packet>,
    pub walk: Option<WalkPlan>,
    pub exit_when_done: bool,
}

impl Command {
    pub fn plan(self) -> Plan {
        let one = |packet: Packet| Plan {
            packets: vec![packet],
            walk: None,
            exit_when_done: true,
        };
        match self {
            Command::Watch => Plan {
                packets: Vec::new(),
                walk: None,
                exit_when_done: false,
            },
            Command::Walk {
                from_x,
                from_y,
                from_z,
                to_x,
                to_z,
                speed,
            } => Plan {
                packets: Vec::new(),
                walk: Some(WalkPlan {
                    start: DVec3::new(from_x, from_y, from_z),
                    target: DVec3::new(to_x, from_y, to_z),
                    speed,
                }),
                exit_when_done: true,
            },
            Command::Teleport { x, y, z, relative } => one(
                packet::TeleportRequest {
                    x,
                    y,
                    z,
                    relative: if relative {
                        RelativeFlags(RelativeFlags::X | RelativeFlags::Y | RelativeFlags::Z)
                    } else {
                        RelativeFlags::absolute()
                    },
                }
                .into(),
            ),
            Command::Create {
                name,
                x,
                z,
                width,
                depth,
                height,
            } => one(
                packet::CreateBarrier {
                    name,
                    origin_x: x,
                    origin_z: z,
                    width,
                    depth,
                    height,
                }
                .into(),
            ),
            Command::Remove { name } => one(packet::RemoveBarrier { name }.into()),
            Command::ClearAll => one(packet::ClearBarriers {}.into()),
            Command::Activate { name } => one(packet::SetActiveBarrier { name: Some(name) }.into()),
            Command::Deactivate => one(packet::SetActiveBarrier { name: None }.into()),
            Command::Focus { name } => one(packet::SetBarrierFocus { name }.into()),
            Command::Cell {
                x,
                y,
                z,
                clear,
                target,
            } => one(
                packet::EditCell {
                    target,
                    x,
                    y,
                    z,
                    solid: !clear,
                }
                .into(),
            ),
            Command::Column { x, z, clear, target } => one(
                packet::EditColumn {
                    target,
                    x,
                    z,
                    solid: !clear,
                }
                .into(),
            ),
            Command::Line {
                x1,
                z1,
                x2,
                z2,
                clear,
                target,
            } => one(
                packet::EditLine {
                    target,
                    x1,
                    z1,
                    x2,
                    z2,
                    solid: !clear,
                }
                .into(),
            ),
            Command::Resize {
                x,
                z,
                width,
                depth,
                height,
                target,
            } => one(
                packet::ResizeBarrier {
                    target,
                    origin_x: x,
                    origin_z: z,
                    width,
                    depth,
                    height,
                }
                .into(),
            ),
            Command::Tool {
                eye_x,
                eye_y,
                eye_z,
                look_x,
                look_y,
                look_z,
                remove,
            } => one(
                packet::ToolUse {
                    eye_x,
                    eye_y,
                    eye_z,
                    look_x,
                    look_y,
                    look_z,
                    action: if remove {
                        ToolAction::Break
                    } else {
                        ToolAction::Place
                    },
                }
                .into(),
            ),
        }
    }
}

/// Packets the server answers with `EditFeedback`.
pub fn expects_feedback(packet: &Packet) -> bool {
    !matches!(
        packet,
        Packet::TeleportRequest(_) | Packet::PlayerMove(_) | Packet::Hello(_)
    )
}

/// Outstanding scripted requests.
#[derive(Resource, Debug, Clone, Default)]
pub struct Script {
    pending: VecDeque<Packet>,
    awaiting_feedback: usize,
    awaiting_correction: usize,
    exit_when_done: bool,
}

impl Script {
    pub fn new(packets: Vec<Packet>, exit_when_done: bool) -> Self {
        Self {
            pending: packets.into(),
            awaiting_feedback: 0,
            awaiting_correction: 0,
            exit_when_done,
        }
    }

    /// Hands out every unsent packet and starts waiting for their answers.
    pub fn take_pending(&mut self) -> Vec<Packet> {
        let packets: Vec<Packet> = self.pending.drain(..).collect();
        for packet in &packets {
            if expects_feedback(packet) {
                self.awaiting_feedback += 1;
            } else if matches!(packet, Packet::TeleportRequest(_)) {
                self.awaiting_correction += 1;
            }
        }
        packets
    }

    pub fn on_feedback(&mut self) {
        self.awaiting_feedback = self.awaiting_feedback.saturating_sub(1);
    }

    pub fn on_correction(&mut self) {
        self.awaiting_correction = self.awaiting_correction.saturating_sub(1);
    }

    pub fn finished(&self) -> bool {
        self.pending.is_empty() && self.awaiting_feedback == 0 && self.awaiting_correction == 0
    }

    pub fn exit_when_done(&self) -> bool {
        self.exit_when_done
    }
}

pub fn send_script_system(
    app_state: Res<AppState>,
    to_net: Res<ToNet>,
    mut script: ResMut<Script>,
) {
    if app_state.0 != ApplicationState::Connected {
        return;
    }
    for packet in script.take_pending() {
        info!("sending {}", packet.name());
        let _ = to_net.0.send(ToNetMessage::Send(packet));
    }
}

pub fn exit_when_done_system(
    script: Res<Script>,
    input: Res<CurrentInput>,
    app_state: Res<AppState>,
    mut exit: EventWriter<AppExit>,
) {
    if app_state.0 != ApplicationState::Connected || !script.exit_when_done() {
        return;
    }
    if script.finished() && input.0.target.is_none() {
        info!("all requests answered");
        exit.write(AppExit::Success);
    }
}
