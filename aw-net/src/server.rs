use std::collections::BTreeMap;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use aw_protocol::protocol::packet::{self, Packet};
use aw_protocol::protocol::{Conn, PROTOCOL_VERSION, VarInt};
use aw_utils::{ClientId, ServerInbound, ServerOutbound};
use crossbeam::channel::{Receiver, Sender, select, unbounded};
use tracing::{debug, info, warn};

pub const MAX_USERNAME_LEN: usize = 16;

enum WriterEvent {
    Register(ClientId, Conn),
    Unregister(ClientId),
}

pub fn valid_username(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_USERNAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Binds `bind` and starts the accept and dispatch threads. Returns the bound
/// address, which differs from `bind` when port 0 was requested.
///
/// A client whose socket stays unwritable for `write_timeout` is dropped so
/// it cannot stall delivery to everyone else.
pub fn start_server(
    bind: &str,
    compression_threshold: i32,
    write_timeout: Duration,
    from_main: Receiver<ServerOutbound>,
    to_main: Sender<ServerInbound>,
) -> io::Result<SocketAddr> {
    let listener = TcpListener::bind(bind)?;
    let local_addr = listener.local_addr()?;
    info!("Listening on {}", local_addr);

    let (writers_tx, writers_rx) = unbounded();
    thread::spawn(move || dispatch_loop(from_main, writers_rx));
    thread::spawn(move || {
        accept_loop(listener, compression_threshold, write_timeout, writers_tx, to_main)
    });

    Ok(local_addr)
}

fn accept_loop(
    listener: TcpListener,
    compression_threshold: i32,
    write_timeout: Duration,
    writers: Sender<WriterEvent>,
    to_main: Sender<ServerInbound>,
) {
    let mut next_id = 0u64;
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                continue;
            }
        };
        next_id += 1;
        let client = ClientId(next_id);
        let writers = writers.clone();
        let to_main = to_main.clone();
        thread::spawn(move || {
            serve_connection(
                stream,
                client,
                compression_threshold,
                write_timeout,
                writers,
                to_main,
            )
        });
    }
}

fn serve_connection(
    stream: TcpStream,
    client: ClientId,
    compression_threshold: i32,
    write_timeout: Duration,
    writers: Sender<WriterEvent>,
    to_main: Sender<ServerInbound>,
) {
    let mut conn = match Conn::accept(stream) {
        Ok(conn) => conn,
        Err(e) => {
            warn!(%client, "Failed to set up connection: {}", e);
            return;
        }
    };
    let username = match handshake(&mut conn, compression_threshold) {
        Ok(username) => username,
        Err(e) => {
            info!(%client, peer = %conn.peer, "Handshake failed: {}", e);
            conn.shutdown();
            return;
        }
    };
    let writer = match conn
        .try_clone()
        .and_then(|writer| writer.set_write_timeout(Some(write_timeout)).map(|()| writer))
    {
        Ok(writer) => writer,
        Err(e) => {
            warn!(%client, "Failed to split connection: {}", e);
            conn.shutdown();
            return;
        }
    };

    if writers.send(WriterEvent::Register(client, writer)).is_err() {
        conn.shutdown();
        return;
    }
    info!(%client, %username, peer = %conn.peer, "client joined");
    if to_main
        .send(ServerInbound::Joined { client, username })
        .is_ok()
    {
        loop {
            match conn.read_packet() {
                Ok(packet) => {
                    if to_main.send(ServerInbound::Packet { client, packet }).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(%client, "Connection closed: {}", e);
                    break;
                }
            }
        }
    }

    conn.shutdown();
    let _ = writers.send(WriterEvent::Unregister(client));
    let _ = to_main.send(ServerInbound::Left { client });
}

/// Reads Hello, answers Welcome and switches the connection to the agreed
/// compression threshold.
fn handshake(conn: &mut Conn, compression_threshold: i32) -> Result<String, Box<dyn std::error::Error>> {
    let hello = match conn.read_packet()? {
        Packet::Hello(hello) => hello,
        other => return Err(format!("expected Hello, got {}", other.name()).into()),
    };

    if hello.protocol_version.0 != PROTOCOL_VERSION {
        let reason = format!(
            "Unsupported protocol {} (server speaks {})",
            hello.protocol_version.0, PROTOCOL_VERSION
        );
        conn.write_packet(packet::Disconnect {
            reason: reason.clone(),
        })?;
        return Err(reason.into());
    }
    if !valid_username(&hello.username) {
        let reason = format!("Invalid username {:?}", hello.username);
        conn.write_packet(packet::Disconnect {
            reason: reason.clone(),
        })?;
        return Err(reason.into());
    }

    conn.write_packet(packet::Welcome {
        protocol_version: VarInt(PROTOCOL_VERSION),
        compression_threshold: VarInt(compression_threshold),
    })?;
    conn.set_compression(compression_threshold);
    Ok(hello.username)
}

fn dispatch_loop(from_main: Receiver<ServerOutbound>, writer_events: Receiver<WriterEvent>) {
    let mut writers: BTreeMap<ClientId, Conn> = BTreeMap::new();

    loop {
        select! {
            recv(writer_events) -> event => match event {
                Ok(event) => apply_writer_event(&mut writers, event),
                Err(_) => break,
            },
            recv(from_main) -> msg => {
                let Ok(msg) = msg else {
                    break;
                };
                // A registration always precedes the Joined it enables, so
                // settle pending ones before routing.
                while let Ok(event) = writer_events.try_recv() {
                    apply_writer_event(&mut writers, event);
                }
                dispatch(&mut writers, msg);
            },
        }
    }

    for conn in writers.values() {
        conn.shutdown();
    }
}

fn apply_writer_event(writers: &mut BTreeMap<ClientId, Conn>, event: WriterEvent) {
    match event {
        WriterEvent::Register(client, conn) => {
            writers.insert(client, conn);
        }
        WriterEvent::Unregister(client) => {
            writers.remove(&client);
        }
    }
}

fn dispatch(writers: &mut BTreeMap<ClientId, Conn>, msg: ServerOutbound) {
    match msg {
        ServerOutbound::Send { client, packet } => {
            let Some(conn) = writers.get_mut(&client) else {
                debug!(%client, "dropping {} for unknown client", packet.name());
                return;
            };
            if let Err(e) = conn.write_packet(packet) {
                warn!(%client, "Error writing packet: {}", e);
                drop_writer(writers, client);
            }
        }
        ServerOutbound::Broadcast(packet) => {
            let mut failed = Vec::new();
            for (&client, conn) in writers.iter_mut() {
                if let Err(e) = conn.write_packet(packet.clone()) {
                    warn!(%client, "Error writing broadcast: {}", e);
                    failed.push(client);
                }
            }
            for client in failed {
                drop_writer(writers, client);
            }
        }
        ServerOutbound::Kick { client, reason } => {
            if let Some(mut conn) = writers.remove(&client) {
                info!(%client, %reason, "kicking client");
                let _ = conn.write_packet(packet::Disconnect { reason });
                conn.shutdown();
            }
        }
    }
}

fn drop_writer(writers: &mut BTreeMap<ClientId, Conn>, client: ClientId) {
    if let Some(conn) = writers.remove(&client) {
        conn.shutdown();
    }
}
