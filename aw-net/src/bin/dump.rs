use std::env;

use aw_protocol::protocol::packet::Packet;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Usage: dump [host:port] [username]
    let args: Vec<String> = env::args().collect();
    let target = args.get(1).map(|s| s.as_str()).unwrap_or("127.0.0.1:25590");
    let username = args.get(2).map(|s| s.as_str()).unwrap_or("dumper");

    println!("Connecting to {} as {}", target, username);
    let mut conn = aw_net::connect(target, username)?;
    println!("Welcome received (threshold={})", conn.compression_threshold());

    loop {
        match conn.read_packet() {
            Ok(Packet::SyncBarrierNames(sync)) => {
                println!("RECV: SyncBarrierNames {:?}", sync.names);
            }
            Ok(Packet::SyncBarrier(sync)) => match &sync.snapshot {
                Some(snapshot) => {
                    let solid: u32 = snapshot.cells.0.iter().map(|byte| byte.count_ones()).sum();
                    println!(
                        "RECV: SyncBarrier {:?} '{}' origin=({}, {}) size={}x{}x{} solid={}",
                        sync.scope,
                        sync.name,
                        snapshot.origin_x,
                        snapshot.origin_z,
                        snapshot.width,
                        snapshot.depth,
                        snapshot.height,
                        solid
                    );
                }
                None => println!("RECV: SyncBarrier {:?} <none>", sync.scope),
            },
            Ok(Packet::Disconnect(dc)) => {
                println!("RECV: Disconnect ({})", dc.reason);
                return Ok(());
            }
            Ok(other) => println!("RECV: {:?}", other),
            Err(e) => {
                println!("Error reading packet: {}", e);
                return Err(Box::new(e));
            }
        }
    }
}
