// SPDX-License-Identifier: MIT

//! Custom-type registry: scanning a recipes directory registers type names
//! whose default recipe path and default parameters apply when a want of
//! that type is submitted without an explicit recipe (spec.md §6).

use crate::loader::{load_recipe_file, RecipeError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CustomTypeEntry {
    pub recipe_path: PathBuf,
    pub default_params: BTreeMap<String, Value>,
}

/// Process-wide registry of custom types discovered under a recipes
/// directory, initialized once at startup (spec.md §6's "global state").
#[derive(Default, Clone)]
pub struct CustomTypeRegistry {
    entries: Arc<RwLock<BTreeMap<String, CustomTypeEntry>>>,
}

impl CustomTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan every `*.yaml`/`*.yml` file directly under `dir`, registering any
    /// recipe whose `metadata.customType` is set.
    pub fn scan_directory(&self, dir: &Path) -> Result<usize, RecipeError> {
        let mut registered = 0;
        let read_dir = std::fs::read_dir(dir)
            .map_err(|source| RecipeError::Read { path: dir.display().to_string(), source })?;
        for entry in read_dir {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            let is_recipe_file =
                matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"));
            if !is_recipe_file {
                continue;
            }
            let recipe = load_recipe_file(&path)?;
            if let Some(custom_type) = recipe.metadata.custom_type.clone() {
                self.entries.write().insert(
                    custom_type,
                    CustomTypeEntry { recipe_path: path.clone(), default_params: recipe.parameters.clone() },
                );
                registered += 1;
            }
        }
        Ok(registered)
    }

    pub fn lookup(&self, type_name: &str) -> Option<CustomTypeEntry> {
        self.entries.read().get(type_name).cloned()
    }
}
