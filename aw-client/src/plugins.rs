use aw_utils::{AppState, ApplicationState, FromNet, ToNet};
use bevy::prelude::*;
use bevy::time::Fixed;

use crate::message_handler::{self, PendingWalk};
use crate::replica::BarrierReplica;
use crate::script::{self, Script, WalkPlan};
use crate::sim;
use crate::sim_systems;

pub struct ClientCorePlugin {
    pub initial_state: ApplicationState,
    pub to_net: ToNet,
    pub from_net: FromNet,
    pub script: Script,
    pub walk: Option<WalkPlan>,
}

impl Plugin for ClientCorePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.to_net.clone())
            .insert_resource(self.from_net.clone())
            .insert_resource(AppState(self.initial_state))
            .insert_resource(BarrierReplica::default())
            .insert_resource(self.script.clone())
            .insert_resource(PendingWalk(self.walk))
            .insert_resource(sim::SimClock::default())
            .insert_resource(sim::CurrentInput::default())
            .insert_resource(sim::SimState::default())
            .insert_resource(sim::DebugStats::default());
    }
}

pub struct ClientNetPlugin;

impl Plugin for ClientNetPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (
                message_handler::handle_messages,
                script::send_script_system,
                script::exit_when_done_system,
            )
                .chain(),
        );
    }
}

pub struct ClientSimPlugin {
    pub tick_rate_hz: f64,
}

impl Plugin for ClientSimPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Time::<Fixed>::from_hz(self.tick_rate_hz))
            .add_systems(FixedUpdate, sim_systems::fixed_sim_tick_system);
    }
}
