use aw_protocol::protocol::packet::SyncScope;
use aw_sim::VoxelGrid;
use bevy::prelude::Resource;

/// A named grid held by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaSlot {
    pub name: String,
    pub grid: VoxelGrid,
}

/// Local copy of what the server last told us. Every grid sync replaces the
/// whole slot; there is no partial update.
#[derive(Resource, Debug, Default)]
pub struct BarrierReplica {
    names: Vec<String>,
    active: Option<ReplicaSlot>,
    focus: Option<ReplicaSlot>,
    syncs: u64,
}

impl BarrierReplica {
    pub fn apply_names(&mut self, names: Vec<String>) {
        self.names = names;
    }

    /// `grid: None` clears the slot.
    pub fn apply_sync(&mut self, scope: SyncScope, name: String, grid: Option<VoxelGrid>) {
        let slot = grid.map(|grid| ReplicaSlot { name, grid });
        match scope {
            SyncScope::Active => self.active = slot,
            SyncScope::Focus => self.focus = slot,
        }
        self.syncs += 1;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn active(&self) -> Option<&ReplicaSlot> {
        self.active.as_ref()
    }

    pub fn focus(&self) -> Option<&ReplicaSlot> {
        self.focus.as_ref()
    }

    pub fn active_grid(&self) -> Option<&VoxelGrid> {
        self.active.as_ref().map(|slot| &slot.grid)
    }

    pub fn sync_count(&self) -> u64 {
        self.syncs
    }
}
