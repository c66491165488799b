pub mod aabb;
pub mod collision;
pub mod face;
pub mod grid;
pub mod intercept;
pub mod line;
pub mod penetration;
pub mod pick;
pub mod registry;

pub use aabb::{Aabb, BodySize};
pub use collision::{BarrierCollision, CollisionProvider};
pub use face::{Axis, Direction};
pub use grid::VoxelGrid;
pub use intercept::{InterceptConfig, WallIntercept};
pub use penetration::{BodyState, Correction, PenetrationConfig, PenetrationResolver};
pub use pick::{EditTarget, FlatGround, NoTerrain, TerrainRaycast};
pub use registry::{BarrierRegistry, EditOutcome, EditorId, RegistryChange};
