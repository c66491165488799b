use std::time::Duration;

use aw_protocol::protocol::enable_network_debug;
use aw_utils::{ApplicationState, FromNet, ToNet, ToNetMessage};
use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use clap::Parser;
use tracing::info;

mod message_handler;
mod plugins;
mod replica;
mod script;
mod sim;
mod sim_systems;

#[cfg(test)]
mod tests;

use plugins::{ClientCorePlugin, ClientNetPlugin, ClientSimPlugin};
use script::{Command, Script};

/// Headless airwall client: replicates barriers and scripts edits.
#[derive(Parser, Debug)]
#[command(name = "aw-client", version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:25590")]
    server: String,

    #[arg(long, default_value = "editor")]
    username: String,

    /// Prediction ticks per second.
    #[arg(long, default_value_t = 20.0)]
    tick_rate: f64,

    /// Log every packet sent and received.
    #[arg(long)]
    net_debug: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() -> AppExit {
    tracing_subscriber::fmt().without_time().compact().init();

    let cli = Cli::parse();
    if cli.net_debug {
        enable_network_debug();
    }
    let tick_rate = if cli.tick_rate.is_finite() && cli.tick_rate > 0.0 {
        cli.tick_rate
    } else {
        20.0
    };

    let (tx_outgoing, rx_outgoing) = crossbeam::channel::unbounded();
    let (tx_incoming, rx_incoming) = crossbeam::channel::unbounded();
    std::thread::spawn(move || aw_net::start_networking(rx_outgoing, tx_incoming));

    info!("Connecting to {} as {}", cli.server, cli.username);
    let _ = tx_outgoing.send(ToNetMessage::Connect {
        username: cli.username,
        address: cli.server,
    });

    let plan = cli.command.plan();
    let exit = App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(
            Duration::from_secs_f64(1.0 / 60.0),
        )))
        .add_plugins(ClientCorePlugin {
            initial_state: ApplicationState::Connecting,
            to_net: ToNet(tx_outgoing.clone()),
            from_net: FromNet(rx_incoming),
            script: Script::new(plan.packets, plan.exit_when_done),
            walk: plan.walk,
        })
        .add_plugins(ClientNetPlugin)
        .add_plugins(ClientSimPlugin { tick_rate_hz: tick_rate })
        .run();

    let _ = tx_outgoing.send(ToNetMessage::Shutdown);
    info!(?exit, "client stopped");
    exit
}
