use aw_protocol::protocol::packet::Packet;
use aw_utils::FromNetMessage;
use tracing::warn;

use crate::snapshot::decode_snapshot;

pub fn handle_packet(pkt: Packet, to_main: &crossbeam::channel::Sender<FromNetMessage>) {
    match pkt {
        Packet::SyncBarrierNames(sync) => {
            let _ = to_main.send(FromNetMessage::BarrierNames(sync.names));
        }
        Packet::SyncBarrier(sync) => {
            let grid = match sync.snapshot.as_ref().map(decode_snapshot).transpose() {
                Ok(grid) => grid,
                Err(err) => {
                    warn!(scope = ?sync.scope, name = %sync.name, "dropping barrier sync: {err}");
                    return;
                }
            };
            let _ = to_main.send(FromNetMessage::BarrierSync {
                scope: sync.scope,
                name: sync.name,
                grid,
            });
        }
        Packet::PositionCorrection(pc) => {
            let _ = to_main.send(FromNetMessage::PositionCorrection {
                x: pc.x,
                y: pc.y,
                z: pc.z,
                reset_velocity: pc.reset_velocity,
            });
        }
        Packet::EditFeedback(fb) => {
            let _ = to_main.send(FromNetMessage::EditFeedback {
                ok: fb.ok,
                message: fb.message,
            });
        }
        Packet::Disconnect(dc) => {
            let _ = to_main.send(FromNetMessage::Kicked(dc.reason));
        }
        other => {
            let _ = to_main.send(FromNetMessage::Packet(other));
        }
    }
}
