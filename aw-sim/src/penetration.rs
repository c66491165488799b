use std::collections::HashMap;
use std::hash::Hash;

use bevy::math::DVec3;
use tracing::{debug, warn};

use crate::aabb::{Aabb, BodySize};
use crate::collision::CollisionProvider;
use crate::grid::VoxelGrid;

pub const DEFAULT_PUSH_EPSILON: f64 = 0.003;
pub const DEFAULT_MAX_ROUNDS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenetrationConfig {
    /// Extra distance added to every push so the box ends strictly outside.
    pub push_epsilon: f64,
    pub max_rounds: u32,
    pub body: BodySize,
}

impl Default for PenetrationConfig {
    fn default() -> Self {
        Self {
            push_epsilon: DEFAULT_PUSH_EPSILON,
            max_rounds: DEFAULT_MAX_ROUNDS,
            body: BodySize::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyState {
    pub pos: DVec3,
    pub vel: DVec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// Not overlapping; recorded as the new safe position.
    Clear,
    /// Pushed out of the barrier.
    Pushed { rounds: u32 },
    /// Push failed; moved back to the last safe position.
    Reverted { rounds: u32 },
    /// Push failed and no safe position is known; position unchanged.
    Stuck { rounds: u32 },
}

impl Correction {
    pub fn moved(self) -> bool {
        matches!(self, Correction::Pushed { .. } | Correction::Reverted { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenetrationOutcome {
    pub state: BodyState,
    pub correction: Correction,
}

/// First solid cell box that strictly overlaps `bb`.
pub fn first_overlap(grid: &VoxelGrid, bb: &Aabb) -> Option<Aabb> {
    let mut boxes = Vec::new();
    grid.collect_boxes(bb, &mut boxes);
    boxes.into_iter().find(|cell| bb.intersects(cell))
}

/// Pushes `bb` horizontally out of the barrier, one overlapping cell per
/// round, always along the shortest of the four X/Z exits. Returns the
/// accumulated displacement when the box ends clear, plus the rounds used.
pub fn push_out(grid: &VoxelGrid, bb: Aabb, config: &PenetrationConfig) -> (Option<DVec3>, u32) {
    let eps = config.push_epsilon;
    let mut total = DVec3::ZERO;
    let mut rounds = 0;

    while rounds < config.max_rounds {
        let moved = bb.offset(total);
        let Some(cell) = first_overlap(grid, &moved) else {
            break;
        };
        rounds += 1;

        let candidates = [
            DVec3::new(cell.min.x - moved.max.x - eps, 0.0, 0.0),
            DVec3::new(cell.max.x - moved.min.x + eps, 0.0, 0.0),
            DVec3::new(0.0, 0.0, cell.min.z - moved.max.z - eps),
            DVec3::new(0.0, 0.0, cell.max.z - moved.min.z + eps),
        ];
        let mut best = candidates[0];
        for candidate in &candidates[1..] {
            if candidate.length_squared() < best.length_squared() {
                best = *candidate;
            }
        }
        total += best;
    }

    if first_overlap(grid, &bb.offset(total)).is_some() {
        (None, rounds)
    } else {
        (Some(total), rounds)
    }
}

/// Safety net run after ordinary movement: repairs bodies already inside a
/// barrier and remembers where each body was last clear.
#[derive(Debug)]
pub struct PenetrationResolver<K> {
    config: PenetrationConfig,
    last_safe: HashMap<K, DVec3>,
}

impl<K: Eq + Hash + Clone + std::fmt::Debug> PenetrationResolver<K> {
    pub fn new(config: PenetrationConfig) -> Self {
        Self {
            config,
            last_safe: HashMap::new(),
        }
    }

    pub fn config(&self) -> &PenetrationConfig {
        &self.config
    }

    pub fn last_safe(&self, key: &K) -> Option<DVec3> {
        self.last_safe.get(key).copied()
    }

    pub fn forget(&mut self, key: &K) {
        self.last_safe.remove(key);
    }

    /// Checks one body against `grid` and returns its corrected state. The
    /// result is plain data; applying it never re-enters the resolver.
    pub fn step(&mut self, key: &K, grid: Option<&VoxelGrid>, body: BodyState) -> PenetrationOutcome {
        let bb = Aabb::around_feet(body.pos, self.config.body);
        let Some(grid) = grid.filter(|grid| first_overlap(grid, &bb).is_some()) else {
            self.last_safe.insert(key.clone(), body.pos);
            return PenetrationOutcome {
                state: body,
                correction: Correction::Clear,
            };
        };

        let halted = DVec3::new(0.0, body.vel.y, 0.0);
        let (push, rounds) = push_out(grid, bb, &self.config);

        if let Some(delta) = push {
            let pos = body.pos + delta;
            self.last_safe.insert(key.clone(), pos);
            debug!(?key, ?delta, rounds, "pushed body out of barrier");
            return PenetrationOutcome {
                state: BodyState { pos, vel: halted },
                correction: Correction::Pushed { rounds },
            };
        }

        match self.last_safe.get(key) {
            Some(&safe) => {
                warn!(?key, rounds, "barrier push-out failed; reverting to last safe position");
                PenetrationOutcome {
                    state: BodyState {
                        pos: safe,
                        vel: halted,
                    },
                    correction: Correction::Reverted { rounds },
                }
            }
            None => {
                warn!(?key, rounds, "barrier push-out failed with no safe position");
                PenetrationOutcome {
                    state: BodyState {
                        pos: body.pos,
                        vel: halted,
                    },
                    correction: Correction::Stuck { rounds },
                }
            }
        }
    }
}
