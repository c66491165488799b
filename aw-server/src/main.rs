use std::path::PathBuf;
use std::time::Duration;

use aw_protocol::protocol::enable_network_debug;
use aw_sim::BarrierRegistry;
use aw_utils::{FromClients, ToClients, airwall_data_root};
use bevy::app::{ScheduleRunnerPlugin, TerminalCtrlCHandlerPlugin};
use bevy::prelude::*;
use clap::Parser;
use tracing::info;

mod config;
mod editing;
mod message_handler;
mod movement;
mod persist;
mod plugins;
mod sessions;
mod sync;
mod tools;

#[cfg(test)]
mod tests;

use config::{CONFIG_FILE, ServerConfig};
use plugins::{ServerCorePlugin, ServerNetPlugin};

/// Authoritative airwall barrier server.
#[derive(Parser, Debug)]
#[command(name = "aw-server", version, about, long_about = None)]
struct Cli {
    /// TOML config file. Defaults to server.toml under the data root.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config.
    #[arg(long)]
    bind: Option<String>,

    /// Barrier store, overriding the config.
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Simulation ticks per second, overriding the config.
    #[arg(long)]
    tick_rate: Option<f64>,

    /// Log every packet sent and received.
    #[arg(long)]
    net_debug: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().without_time().compact().init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::load_or_default(&airwall_data_root().join(CONFIG_FILE))?,
    };
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(data_file) = cli.data_file {
        config.data_file = Some(data_file);
    }
    if let Some(tick_rate) = cli.tick_rate {
        config.tick_rate_hz = tick_rate;
    }
    config.validate()?;
    if cli.net_debug {
        enable_network_debug();
    }

    let store_path = config.store_path();
    let registry = persist::load_registry(&store_path, config.legacy_wall_height)?;
    info!(
        path = %store_path.display(),
        barriers = registry.len(),
        active = registry.active_name().unwrap_or("-"),
        "loaded barriers"
    );

    let (to_clients_tx, to_clients_rx) = crossbeam::channel::unbounded();
    let (from_clients_tx, from_clients_rx) = crossbeam::channel::unbounded();
    let addr = aw_net::server::start_server(
        &config.bind,
        config.compression_threshold,
        Duration::from_secs_f64(config.write_timeout_secs),
        to_clients_rx,
        from_clients_tx,
    )?;
    info!("Starting airwall server on {}", addr);

    let tick = Duration::from_secs_f64(1.0 / config.tick_rate_hz);
    let exit = App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(tick)))
        .add_plugins(TerminalCtrlCHandlerPlugin)
        .insert_resource::<BarrierRegistry>(registry)
        .add_plugins(ServerCorePlugin {
            config,
            store_path,
            to_clients: ToClients(to_clients_tx),
            from_clients: FromClients(from_clients_rx),
        })
        .add_plugins(ServerNetPlugin)
        .run();
    info!(?exit, "server stopped");

    Ok(())
}
