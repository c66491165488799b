use std::thread;

use aw_protocol::protocol::packet::{self, Packet};
use aw_protocol::protocol::{Conn, PROTOCOL_VERSION, VarInt, enable_network_debug};
use aw_utils::{FromNetMessage, ToNetMessage};
use tracing::{debug, info, warn};

pub mod handle_packet;
pub mod server;
pub mod snapshot;


/// Client network thread. Owns the write half of the connection; a reader
/// thread is spawned per connection and feeds `to_main`.
pub fn start_networking(
    from_main: crossbeam::channel::Receiver<ToNetMessage>,
    to_main: crossbeam::channel::Sender<FromNetMessage>,
) {
    if std::env::var_os("AIRWALL_NET_DEBUG").is_some() {
        enable_network_debug();
    }
    let mut writer: Option<Conn> = None;

    while let Ok(msg) = from_main.recv() {
        match msg {
            ToNetMessage::Connect { username, address } => {
                if let Some(old) = writer.take() {
                    old.shutdown();
                }
                info!("Connecting to server at {} as {}", address, username);
                match connect(&address, &username) {
                    Ok(conn) => match conn.try_clone() {
                        Ok(reader) => {
                            info!("Connected to server");
                            let to_main_thread = to_main.clone();
                            thread::spawn(move || packet_handler_loop(reader, to_main_thread));
                            writer = Some(conn);
                            let _ = to_main.send(FromNetMessage::Connected);
                        }
                        Err(e) => {
                            warn!("Failed to split connection: {}", e);
                            let _ = to_main.send(FromNetMessage::Disconnected);
                        }
                    },
                    Err(e) => {
                        warn!("Failed to connect to server: {}", e);
                        let _ = to_main.send(FromNetMessage::Disconnected);
                    }
                }
            }
            ToNetMessage::PlayerMove { x, y, z, on_ground } => {
                send(
                    &mut writer,
                    packet::PlayerMove {
                        x,
                        y,
                        z,
                        on_ground,
                    }
                    .into(),
                );
            }
            ToNetMessage::Send(packet) => send(&mut writer, packet),
            ToNetMessage::Disconnect => {
                if let Some(conn) = writer.take() {
                    conn.shutdown();
                }
            }
            ToNetMessage::Shutdown => {
                if let Some(conn) = writer.take() {
                    conn.shutdown();
                }
                break;
            }
        }
    }
}

fn send(writer: &mut Option<Conn>, packet: Packet) {
    let Some(conn) = writer.as_mut() else {
        debug!("dropping {} while offline", packet.name());
        return;
    };
    if let Err(e) = conn.write_packet(packet) {
        warn!("Error writing packet: {}", e);
        conn.shutdown();
        *writer = None;
    }
}

fn packet_handler_loop(mut conn: Conn, to_main: crossbeam::channel::Sender<FromNetMessage>) {
    loop {
        match conn.read_packet() {
            Ok(pkt) => {
                let kicked = matches!(pkt, Packet::Disconnect(_));
                handle_packet::handle_packet(pkt, &to_main);
                if kicked {
                    conn.shutdown();
                    let _ = to_main.send(FromNetMessage::Disconnected);
                    break;
                }
            }
            Err(e) => {
                debug!("Connection closed: {}", e);
                let _ = to_main.send(FromNetMessage::Disconnected);
                break;
            }
        }
    }
}

/// Opens a connection and performs the Hello/Welcome exchange.
pub fn connect(target: &str, username: &str) -> Result<Conn, Box<dyn std::error::Error>> {
    let mut conn = Conn::connect(target)?;

    conn.write_packet(packet::Hello {
        protocol_version: VarInt(PROTOCOL_VERSION),
        username: username.to_string(),
    })?;

    loop {
        match conn.read_packet()? {
            Packet::Welcome(welcome) => {
                if welcome.protocol_version.0 != PROTOCOL_VERSION {
                    return Err(format!(
                        "server speaks protocol {}, expected {}",
                        welcome.protocol_version.0, PROTOCOL_VERSION
                    )
                    .into());
                }
                debug!(
                    "RECV: Welcome (threshold={})",
                    welcome.compression_threshold.0
                );
                conn.set_compression(welcome.compression_threshold.0);
                return Ok(conn);
            }
            Packet::Disconnect(dc) => {
                return Err(format!("rejected by server: {}", dc.reason).into());
            }
            other => {
                debug!("RECV before welcome: {}", other.name());
            }
        }
    }
}
