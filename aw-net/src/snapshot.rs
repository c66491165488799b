use aw_protocol::protocol::ByteArray;
use aw_protocol::protocol::packet::{GridSnapshot, Packet, SyncBarrier, SyncScope};
use aw_sim::VoxelGrid;
use aw_sim::grid::{EMPTY, SOLID};

/// Bytes needed to carry `cells` cells at one bit each.
pub fn packed_len(cells: usize) -> usize {
    cells.div_ceil(8)
}

/// One bit per cell, least significant bit first.
pub fn pack_cells(cells: &[u8]) -> Vec<u8> {
    let mut packed = vec![0u8; packed_len(cells.len())];
    for (i, _) in cells.iter().enumerate().filter(|(_, c)| **c != EMPTY) {
        packed[i / 8] |= 1 << (i % 8);
    }
    packed
}

/// Missing trailing bytes read as empty cells.
pub fn unpack_cells(packed: &[u8], count: usize) -> Vec<u8> {
    (0..count)
        .map(|i| {
            let byte = packed.get(i / 8).copied().unwrap_or(0);
            if byte & (1 << (i % 8)) != 0 {
                SOLID
            } else {
                EMPTY
            }
        })
        .collect()
}

pub fn encode_snapshot(grid: &VoxelGrid) -> GridSnapshot {
    GridSnapshot {
        origin_x: grid.origin_x(),
        origin_z: grid.origin_z(),
        width: grid.width(),
        depth: grid.depth(),
        height: grid.height(),
        cells: ByteArray(pack_cells(grid.cells())),
    }
}

pub fn decode_snapshot(snapshot: &GridSnapshot) -> Result<VoxelGrid, String> {
    let count = aw_sim::grid::cell_count(snapshot.width, snapshot.depth, snapshot.height)
        .ok_or_else(|| {
            format!(
                "Barrier snapshot has invalid dimensions {}x{}x{}",
                snapshot.width, snapshot.depth, snapshot.height
            )
        })?;
    let expected = packed_len(count);
    if snapshot.cells.0.len() != expected {
        return Err(format!(
            "Barrier snapshot cell count mismatch: expected {} bytes, got {}",
            expected,
            snapshot.cells.0.len()
        ));
    }
    VoxelGrid::from_cells(
        snapshot.origin_x,
        snapshot.origin_z,
        snapshot.width,
        snapshot.depth,
        snapshot.height,
        unpack_cells(&snapshot.cells.0, count),
    )
    .ok_or_else(|| "Barrier snapshot origin is not finite".to_string())
}

/// Builds the sync packet for one scope. `None` tells the client the slot is
/// empty.
pub fn sync_packet(scope: SyncScope, name: &str, grid: Option<&VoxelGrid>) -> Packet {
    SyncBarrier {
        scope,
        name: grid.map(|_| name.to_string()).unwrap_or_default(),
        snapshot: grid.map(encode_snapshot),
    }
    .into()
}
