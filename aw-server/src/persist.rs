use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use aw_sim::registry::is_valid_name;
use aw_sim::{BarrierRegistry, EditorId, VoxelGrid};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("store is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Resource, Debug, Clone)]
pub struct StorePath(pub PathBuf);

#[derive(Resource)]
pub struct SaveTimer(pub Timer);

/// One persisted barrier. Records without `h` predate the Y axis and hold
/// one byte per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BarrierRecord {
    x: f64,
    z: f64,
    w: i32,
    d: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    h: Option<i32>,
    grid: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    barriers: BTreeMap<String, BarrierRecord>,
    #[serde(default)]
    active: Option<String>,
    #[serde(default)]
    focus: BTreeMap<String, String>,
}

impl BarrierRecord {
    fn from_grid(grid: &VoxelGrid) -> Self {
        Self {
            x: grid.origin_x(),
            z: grid.origin_z(),
            w: grid.width(),
            d: grid.depth(),
            h: Some(grid.height()),
            grid: STANDARD.encode(grid.cells()),
        }
    }

    fn into_grid(self, legacy_height: i32) -> Result<VoxelGrid, String> {
        let cells = STANDARD
            .decode(self.grid.as_bytes())
            .map_err(|e| format!("bad cell encoding: {e}"))?;
        let grid = match self.h {
            Some(h) => VoxelGrid::from_cells(self.x, self.z, self.w, self.d, h, cells),
            None => VoxelGrid::from_legacy_columns(self.x, self.z, self.w, self.d, legacy_height, &cells),
        };
        grid.ok_or_else(|| {
            format!(
                "bounds {}x{}x{} do not match the stored cells",
                self.w,
                self.d,
                self.h.unwrap_or(legacy_height)
            )
        })
    }
}

pub fn encode_store(registry: &BarrierRegistry) -> Result<String, StoreError> {
    let file = StoreFile {
        barriers: registry
            .barriers()
            .map(|(name, grid)| (name.to_string(), BarrierRecord::from_grid(grid)))
            .collect(),
        active: registry.active_name().map(str::to_string),
        focus: registry
            .focus_entries()
            .map(|(editor, name)| (editor.to_string(), name.to_string()))
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

/// Parses a store. Records that fail to decode are skipped with a warning;
/// only a malformed document is an error.
pub fn decode_store(raw: &str, legacy_height: i32) -> Result<BarrierRegistry, StoreError> {
    let file: StoreFile = serde_json::from_str(raw)?;

    let mut barriers = BTreeMap::new();
    for (name, record) in file.barriers {
        if !is_valid_name(&name) {
            warn!(%name, "skipping stored barrier with invalid name");
            continue;
        }
        let legacy = record.h.is_none();
        match record.into_grid(legacy_height) {
            Ok(grid) => {
                if legacy {
                    info!(%name, height = legacy_height, "migrated legacy barrier");
                }
                barriers.insert(name, grid);
            }
            Err(e) => warn!(%name, "skipping stored barrier: {e}"),
        }
    }

    let focus: HashMap<EditorId, String> = file
        .focus
        .into_iter()
        .map(|(editor, name)| (EditorId(editor), name))
        .collect();

    Ok(BarrierRegistry::from_parts(barriers, file.active, focus))
}

/// Loads the store at `path`; a missing file is an empty registry.
pub fn load_registry(path: &Path, legacy_height: i32) -> Result<BarrierRegistry, StoreError> {
    match fs::read_to_string(path) {
        Ok(raw) => decode_store(&raw, legacy_height),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no barrier store yet; starting empty");
            Ok(BarrierRegistry::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Writes the store next to `path` and renames it into place.
pub fn save_registry(path: &Path, registry: &BarrierRegistry) -> Result<(), StoreError> {
    let json = encode_store(registry)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    {
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        writer.write_all(json.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn autosave(
    time: Res<Time>,
    mut timer: ResMut<SaveTimer>,
    store: Res<StorePath>,
    mut registry: ResMut<BarrierRegistry>,
) {
    if timer.0.tick(time.delta()).just_finished() {
        save_if_dirty(&store.0, &mut registry);
    }
}

/// Flushes edits made since the last autosave once the app is asked to exit.
pub fn save_on_exit(
    mut exits: EventReader<AppExit>,
    store: Res<StorePath>,
    mut registry: ResMut<BarrierRegistry>,
) {
    if exits.is_empty() {
        return;
    }
    exits.clear();
    save_if_dirty(&store.0, &mut registry);
}

fn save_if_dirty(path: &Path, registry: &mut BarrierRegistry) {
    if !registry.is_dirty() {
        return;
    }
    match save_registry(path, registry) {
        Ok(()) => {
            registry.mark_saved();
            info!(path = %path.display(), barriers = registry.len(), "saved barriers");
        }
        Err(e) => warn!(path = %path.display(), "failed to save barriers: {e}"),
    }
}
