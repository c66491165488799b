use std::io::Cursor;

use super::packet::{
    ClearBarriers, EditLine, GridSnapshot, Hello, RelativeFlags, SyncBarrier, SyncBarrierNames,
    SyncScope, TeleportRequest, ToolAction, ToolUse,
};
use super::*;

fn varint_bytes(value: i32) -> Vec<u8> {
    let mut out = Vec::new();
    VarInt(value).write_to(&mut out).unwrap();
    out
}

#[test]
fn varint_known_encodings() {
    assert_eq!(varint_bytes(0), vec![0x00]);
    assert_eq!(varint_bytes(1), vec![0x01]);
    assert_eq!(varint_bytes(127), vec![0x7f]);
    assert_eq!(varint_bytes(128), vec![0x80, 0x01]);
    assert_eq!(varint_bytes(300), vec![0xac, 0x02]);
    assert_eq!(varint_bytes(-1), vec![0xff, 0xff, 0xff, 0xff, 0x0f]);
    assert_eq!(VarInt(300).encoded_len(), 2);
    assert_eq!(VarInt(-1).encoded_len(), 5);
}

#[test]
fn varint_rejects_six_byte_encoding() {
    let bytes = [0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
    let err = VarInt::read_from(&mut Cursor::new(&bytes[..])).unwrap_err();
    assert!(matches!(err, Error::VarIntTooLong));
}

#[test]
fn negative_string_length_is_rejected() {
    let bytes = varint_bytes(-5);
    let err = String::read_from(&mut Cursor::new(bytes)).unwrap_err();
    assert!(matches!(err, Error::NegativeLength(-5)));
}

#[test]
fn sync_barrier_without_snapshot_keeps_has_data_flag() {
    let packet: Packet = SyncBarrier {
        scope: SyncScope::Active,
        name: String::new(),
        snapshot: None,
    }
    .into();
    let frame = encode_frame(&packet, -1).unwrap();
    // id, scope, empty name, has-data=false
    assert_eq!(frame, vec![0x02, 0x00, 0x00, 0x00]);
    let decoded = decode_frame(&frame, Direction::Clientbound, -1).unwrap();
    assert_eq!(decoded, packet);
}

#[test]
fn grid_snapshot_survives_compressed_framing() {
    let cells: Vec<u8> = (0..4 * 3 * 5).map(|i| (i % 2) as u8).collect();
    let packet: Packet = SyncBarrier {
        scope: SyncScope::Focus,
        name: "spawn".to_string(),
        snapshot: Some(GridSnapshot {
            origin_x: -12.5,
            origin_z: 40.0,
            width: 4,
            depth: 3,
            height: 5,
            cells: ByteArray(cells),
        }),
    }
    .into();

    for threshold in [-1, 0, 16, 1 << 20] {
        let frame = encode_frame(&packet, threshold).unwrap();
        let decoded = decode_frame(&frame, Direction::Clientbound, threshold).unwrap();
        assert_eq!(decoded, packet, "threshold {threshold}");
    }
}

#[test]
fn direction_selects_packet_table() {
    let hello: Packet = Hello {
        protocol_version: VarInt(PROTOCOL_VERSION),
        username: "builder".to_string(),
    }
    .into();
    let frame = encode_frame(&hello, -1).unwrap();
    assert_eq!(
        decode_frame(&frame, Direction::Serverbound, -1).unwrap(),
        hello
    );
    // Same id on the other table is the Welcome packet, whose layout differs.
    assert!(decode_frame(&frame, Direction::Clientbound, -1).is_err());
}

#[test]
fn trailing_bytes_are_an_error() {
    let packet: Packet = SyncBarrierNames {
        names: vec!["a".to_string()],
    }
    .into();
    let mut frame = encode_frame(&packet, -1).unwrap();
    frame.push(0x00);
    let err = decode_frame(&frame, Direction::Clientbound, -1).unwrap_err();
    assert!(matches!(err, Error::TrailingBytes { id: 0x01, remaining: 1 }));
}

#[test]
fn serverbound_edit_packets_round_trip() {
    let packets: Vec<Packet> = vec![
        EditLine {
            target: Some("wall".to_string()),
            x1: 0,
            z1: 0,
            x2: -7,
            z2: 3,
            solid: true,
        }
        .into(),
        TeleportRequest {
            x: 1.0,
            y: 0.0,
            z: -4.0,
            relative: RelativeFlags(RelativeFlags::X | RelativeFlags::Z),
        }
        .into(),
        ToolUse {
            eye_x: 0.5,
            eye_y: 1.62,
            eye_z: 0.5,
            look_x: 1.0,
            look_y: 0.0,
            look_z: 0.0,
            action: ToolAction::Break,
        }
        .into(),
        ClearBarriers {}.into(),
    ];
    for packet in packets {
        let frame = encode_frame(&packet, 64).unwrap();
        assert_eq!(
            decode_frame(&frame, Direction::Serverbound, 64).unwrap(),
            packet
        );
    }
}

#[test]
fn unknown_relative_bits_are_rejected() {
    let err = RelativeFlags::read_from(&mut Cursor::new(vec![0x08])).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { .. }));
}
