use std::fmt;
use std::path::{Path, PathBuf};

use aw_protocol::protocol::packet::{Packet, SyncScope};
use aw_sim::VoxelGrid;
use bevy::ecs::resource::Resource;
use crossbeam::channel::{Receiver, Sender};

pub const AIRWALL_DATA_ROOT_ENV: &str = "AIRWALL_DATA_ROOT";

/// Directory holding persisted barrier state and the server config.
pub fn airwall_data_root() -> PathBuf {
    if let Ok(explicit) = std::env::var(AIRWALL_DATA_ROOT_ENV) {
        let path = PathBuf::from(explicit);
        if path.exists() {
            return path;
        }
    }

    if let Ok(exe) = std::env::current_exe()
        && let Some(exe_dir) = exe.parent()
    {
        let sibling = exe_dir.join("data");
        if sibling.exists() {
            return sibling;
        }
    }

    let repo_data = Path::new(env!("CARGO_MANIFEST_DIR")).join("../data");
    if repo_data.exists() {
        return repo_data;
    }

    PathBuf::from("data")
}

#[derive(Resource)]
pub struct AppState(pub ApplicationState);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationState {
    Disconnected,
    Connecting,
    Connected,
}

/// Server-assigned connection id. Stable for one connection only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub enum ToNetMessage {
    Connect { username: String, address: String },
    Disconnect,
    Shutdown,
    PlayerMove { x: f64, y: f64, z: f64, on_ground: bool },
    Send(Packet),
}

pub enum FromNetMessage {
    Connected,
    Disconnected,
    BarrierNames(Vec<String>),
    /// `grid: None` means the server has no barrier for this scope.
    BarrierSync {
        scope: SyncScope,
        name: String,
        grid: Option<VoxelGrid>,
    },
    PositionCorrection {
        x: f64,
        y: f64,
        z: f64,
        reset_velocity: bool,
    },
    EditFeedback {
        ok: bool,
        message: String,
    },
    Kicked(String),
    Packet(Packet),
}

#[derive(Resource, Clone)]
pub struct ToNet(pub Sender<ToNetMessage>);

#[derive(Resource, Clone)]
pub struct FromNet(pub Receiver<FromNetMessage>);

/// What the server's network threads report to the main loop.
#[derive(Debug)]
pub enum ServerInbound {
    Joined { client: ClientId, username: String },
    Packet { client: ClientId, packet: Packet },
    Left { client: ClientId },
}

/// What the main loop asks the server's network threads to send.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerOutbound {
    Send { client: ClientId, packet: Packet },
    Broadcast(Packet),
    Kick { client: ClientId, reason: String },
}

#[derive(Resource, Clone)]
pub struct FromClients(pub Receiver<ServerInbound>);

#[derive(Resource, Clone)]
pub struct ToClients(pub Sender<ServerOutbound>);
