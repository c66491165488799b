use std::collections::{BTreeMap, HashMap};
use std::fmt;

use bevy::prelude::Resource;

use crate::aabb::Aabb;
use crate::collision::CollisionProvider;
use crate::grid::{MAX_DEPTH, MAX_WIDTH, VoxelGrid};
use crate::line::BresenhamLine;

pub const MAX_NAME_LEN: usize = 64;

/// Identity of an editor. Usernames are stable across reconnects, so the
/// persisted focus map is keyed by them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EditorId(pub String);

impl EditorId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EditorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_NAME_LEN && !name.chars().any(char::is_whitespace)
}

/// What happened to the registry since the last drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    NamesChanged,
    ActiveChanged,
    GridEdited(String),
    Removed(String),
    FocusChanged(EditorId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Changed,
    Unchanged,
    UnknownBarrier,
    OutOfBounds,
}

impl EditOutcome {
    pub fn applied(self) -> bool {
        matches!(self, EditOutcome::Changed | EditOutcome::Unchanged)
    }
}

#[derive(Resource, Default, Debug)]
pub struct BarrierRegistry {
    barriers: BTreeMap<String, VoxelGrid>,
    active: Option<String>,
    focus: HashMap<EditorId, String>,
    changes: Vec<RegistryChange>,
    dirty: bool,
}

impl BarrierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a registry from persisted parts. References to missing
    /// barriers are dropped.
    pub fn from_parts(
        barriers: BTreeMap<String, VoxelGrid>,
        active: Option<String>,
        focus: HashMap<EditorId, String>,
    ) -> Self {
        let active = active.filter(|name| barriers.contains_key(name));
        let focus = focus
            .into_iter()
            .filter(|(_, name)| barriers.contains_key(name))
            .collect();
        Self {
            barriers,
            active,
            focus,
            changes: Vec::new(),
            dirty: false,
        }
    }

    /// Creates (or replaces) a barrier. Invalid names or dimensions are a
    /// no-op returning `false`.
    pub fn create(
        &mut self,
        name: &str,
        origin_x: f64,
        origin_z: f64,
        width: i32,
        depth: i32,
        height: i32,
    ) -> bool {
        if !is_valid_name(name) {
            return false;
        }
        let Some(grid) = VoxelGrid::new(origin_x, origin_z, width, depth, height) else {
            return false;
        };
        let replaced = self.barriers.insert(name.to_string(), grid).is_some();
        self.changes.push(RegistryChange::NamesChanged);
        if replaced {
            self.changes.push(RegistryChange::GridEdited(name.to_string()));
        }
        self.dirty = true;
        true
    }

    pub fn remove(&mut self, name: &str) -> bool {
        if self.barriers.remove(name).is_none() {
            return false;
        }
        self.changes.push(RegistryChange::NamesChanged);
        if self.active.as_deref() == Some(name) {
            self.active = None;
            self.changes.push(RegistryChange::ActiveChanged);
        }
        self.changes.push(RegistryChange::Removed(name.to_string()));
        self.dirty = true;
        true
    }

    /// Removes every barrier. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let names: Vec<String> = self.barriers.keys().cloned().collect();
        names.iter().filter(|name| self.remove(name)).count()
    }

    pub fn get(&self, name: &str) -> Option<&VoxelGrid> {
        self.barriers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.barriers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.barriers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.barriers.is_empty()
    }

    /// Barrier names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.barriers.keys().map(String::as_str)
    }

    pub fn barriers(&self) -> impl Iterator<Item = (&str, &VoxelGrid)> {
        self.barriers.iter().map(|(name, grid)| (name.as_str(), grid))
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_grid(&self) -> Option<&VoxelGrid> {
        self.active.as_deref().and_then(|name| self.barriers.get(name))
    }

    /// `None` clears the active barrier. An unknown name is ignored and
    /// returns `false`.
    pub fn set_active(&mut self, name: Option<&str>) -> bool {
        if let Some(name) = name
            && !self.barriers.contains_key(name)
        {
            return false;
        }
        if self.active.as_deref() == name {
            return true;
        }
        self.active = name.map(str::to_string);
        self.changes.push(RegistryChange::NamesChanged);
        self.changes.push(RegistryChange::ActiveChanged);
        self.dirty = true;
        true
    }

    /// Ignored (returns `false`) when the barrier does not exist.
    pub fn set_focus(&mut self, editor: &EditorId, name: &str) -> bool {
        if !self.barriers.contains_key(name) {
            return false;
        }
        let previous = self.focus.insert(editor.clone(), name.to_string());
        if previous.as_deref() != Some(name) {
            self.dirty = true;
        }
        self.changes.push(RegistryChange::FocusChanged(editor.clone()));
        true
    }

    /// The editor's focus. An entry naming a removed barrier reads as unset.
    pub fn focus(&self, editor: &EditorId) -> Option<&str> {
        self.focus
            .get(editor)
            .map(String::as_str)
            .filter(|name| self.barriers.contains_key(*name))
    }

    /// Returns the editor's focus, dropping a dangling entry and assigning
    /// the active barrier (or else the first barrier) when unset.
    pub fn resolve_focus(&mut self, editor: &EditorId) -> Option<String> {
        if let Some(name) = self.focus(editor) {
            return Some(name.to_string());
        }
        if self.focus.remove(editor).is_some() {
            self.dirty = true;
        }
        let fallback = self
            .active
            .clone()
            .or_else(|| self.barriers.keys().next().cloned())?;
        self.focus.insert(editor.clone(), fallback.clone());
        self.dirty = true;
        Some(fallback)
    }

    /// Editors whose focus entry names `name`, including dangling entries.
    pub fn editors_focusing<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a EditorId> {
        self.focus
            .iter()
            .filter(move |(_, focused)| focused.as_str() == name)
            .map(|(editor, _)| editor)
    }

    /// Focus entries that still point at an existing barrier.
    pub fn focus_entries(&self) -> impl Iterator<Item = (&EditorId, &str)> {
        self.focus
            .iter()
            .filter(|(_, name)| self.barriers.contains_key(name.as_str()))
            .map(|(editor, name)| (editor, name.as_str()))
    }

    /// The barrier an editor's edits apply to: their focus, else the active one.
    pub fn edit_target(&self, editor: &EditorId) -> Option<String> {
        self.focus(editor)
            .or(self.active.as_deref())
            .map(str::to_string)
    }

    pub fn active_collides(&self, query: &Aabb) -> bool {
        self.active_grid().is_some_and(|grid| grid.collides(query))
    }

    pub fn set_cell(&mut self, name: &str, x: i32, y: i32, z: i32, solid: bool) -> EditOutcome {
        let Some(grid) = self.barriers.get_mut(name) else {
            return EditOutcome::UnknownBarrier;
        };
        if !grid.contains(x, y, z) {
            return EditOutcome::OutOfBounds;
        }
        let changed = grid.set_solid(x, y, z, solid);
        self.edited(name, changed)
    }

    pub fn set_column(&mut self, name: &str, x: i32, z: i32, solid: bool) -> EditOutcome {
        let Some(grid) = self.barriers.get_mut(name) else {
            return EditOutcome::UnknownBarrier;
        };
        if !grid.contains_column(x, z) {
            return EditOutcome::OutOfBounds;
        }
        let changed = grid.set_column(x, z, solid);
        self.edited(name, changed)
    }

    /// Fills (or clears) every column on the Bresenham line between two
    /// local (x, z) points. Points outside the grid are skipped.
    pub fn draw_line(
        &mut self,
        name: &str,
        x1: i32,
        z1: i32,
        x2: i32,
        z2: i32,
        solid: bool,
    ) -> EditOutcome {
        let Some(grid) = self.barriers.get_mut(name) else {
            return EditOutcome::UnknownBarrier;
        };
        let line = BresenhamLine::new(x1, z1, x2, z2);
        if line.span() > (MAX_WIDTH + MAX_DEPTH) as u64 {
            return EditOutcome::OutOfBounds;
        }
        let mut touched = false;
        let mut changed = false;
        for (x, z) in line {
            if grid.contains_column(x, z) {
                touched = true;
                changed |= grid.set_column(x, z, solid);
            }
        }
        if !touched {
            return EditOutcome::OutOfBounds;
        }
        self.edited(name, changed)
    }

    /// Reallocates a barrier with new bounds; contents are discarded.
    pub fn resize(
        &mut self,
        name: &str,
        origin_x: f64,
        origin_z: f64,
        width: i32,
        depth: i32,
        height: i32,
    ) -> EditOutcome {
        let Some(grid) = self.barriers.get_mut(name) else {
            return EditOutcome::UnknownBarrier;
        };
        if !grid.resize(origin_x, origin_z, width, depth, height) {
            return EditOutcome::OutOfBounds;
        }
        self.edited(name, true)
    }

    fn edited(&mut self, name: &str, changed: bool) -> EditOutcome {
        if !changed {
            return EditOutcome::Unchanged;
        }
        self.changes.push(RegistryChange::GridEdited(name.to_string()));
        self.dirty = true;
        EditOutcome::Changed
    }

    pub fn drain_changes(&mut self) -> Vec<RegistryChange> {
        std::mem::take(&mut self.changes)
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }
}
