use std::path::PathBuf;

use aw_utils::{FromClients, ToClients};
use bevy::prelude::*;

use crate::config::ServerConfig;
use crate::message_handler;
use crate::movement;
use crate::persist::{self, SaveTimer, StorePath};
use crate::sessions::{BodyGuard, Sessions};
use crate::sync::{self, ResyncTimer};

pub struct ServerCorePlugin {
    pub config: ServerConfig,
    pub store_path: PathBuf,
    pub to_clients: ToClients,
    pub from_clients: FromClients,
}

impl Plugin for ServerCorePlugin {
    fn build(&self, app: &mut App) {
        let config = &self.config;
        app.insert_resource(config.clone())
            .insert_resource(StorePath(self.store_path.clone()))
            .insert_resource(self.to_clients.clone())
            .insert_resource(self.from_clients.clone())
            .insert_resource(Sessions::default())
            .insert_resource(BodyGuard::new(config.collision.penetration()))
            .insert_resource(SaveTimer(Timer::from_seconds(
                config.save_interval_secs as f32,
                TimerMode::Repeating,
            )))
            .insert_resource(ResyncTimer(Timer::from_seconds(
                config.resync_interval_secs as f32,
                TimerMode::Repeating,
            )));
    }
}

pub struct ServerNetPlugin;

impl Plugin for ServerNetPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (
                message_handler::handle_messages,
                movement::penetration_tick,
                sync::broadcast_changes,
                sync::periodic_resync,
                persist::autosave,
            )
                .chain(),
        )
        .add_systems(Last, persist::save_on_exit);
    }
}
