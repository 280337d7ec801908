// SPDX-License-Identifier: MIT

//! Snapshot export/import (spec.md §4.8, §6): `{wants: [Want…]}` as YAML.

use chrono::{DateTime, Utc};
use mywant_core::Want;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("import rejected: want id {id} collides with a live want")]
    IdCollision { id: String },
    #[error("import rejected: want at index {index} carries no id")]
    MissingId { index: usize },
}

/// A full mirror of the live want set at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "v", default = "default_version")]
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub wants: Vec<Want>,
}

fn default_version() -> u32 {
    CURRENT_SNAPSHOT_VERSION
}

impl Snapshot {
    /// Build a snapshot from the current want set. `include_system`
    /// controls whether `system_want` wants are mirrored (spec.md §6: export
    /// accepts an "optional include-system flag").
    pub fn from_wants(wants: Vec<Want>, include_system: bool, created_at: DateTime<Utc>) -> Self {
        let wants = if include_system { wants } else { wants.into_iter().filter(|w| !w.system_want).collect() };
        Self { version: CURRENT_SNAPSHOT_VERSION, created_at, wants }
    }

    pub fn to_yaml(&self) -> Result<String, SnapshotError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, SnapshotError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Validate that every want carries an id and none collides with a
    /// currently-live id (spec.md §4.8: "collisions fail the whole import").
    pub fn validate_for_import(&self, live_ids: &HashSet<String>) -> Result<(), SnapshotError> {
        for (index, want) in self.wants.iter().enumerate() {
            if want.id.as_str().is_empty() {
                return Err(SnapshotError::MissingId { index });
            }
            if live_ids.contains(want.id.as_str()) {
                return Err(SnapshotError::IdCollision { id: want.id.as_str().to_string() });
            }
        }
        Ok(())
    }
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out. Keeps
/// up to [`MAX_BAK_FILES`] backups, removing the oldest when full.
pub fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| if n == 1 { path.with_extension("bak") } else { path.with_extension(format!("bak.{n}")) };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }
    bak(1)
}

/// Write `snapshot` to `path` atomically-ish: write a temp file then rename,
/// rotating the previous file into a backup slot first.
pub fn write_snapshot_file(path: &Path, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    let yaml = snapshot.to_yaml()?;
    if path.exists() {
        let bak_path = rotate_bak_path(path);
        fs::copy(path, bak_path)?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, yaml)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn read_snapshot_file(path: &Path) -> Result<Snapshot, SnapshotError> {
    let yaml = fs::read_to_string(path)?;
    Snapshot::from_yaml(&yaml)
}
