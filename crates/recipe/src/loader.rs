// SPDX-License-Identifier: MIT

//! Recipe expansion: turn a target want's `spec.recipe` reference into a
//! concrete set of owned wants (spec.md §6).

use crate::recipe::{RecipeBody, RecipeFile, WantTemplate};
use crate::template::substitute_value;
use mywant_core::{Using, Want, WantSpec};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("failed to read recipe file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse recipe file {path}: {source}")]
    Parse { path: String, source: serde_yaml::Error },
}

/// Load and parse a recipe file from disk.
pub fn load_recipe_file(path: &Path) -> Result<RecipeBody, RecipeError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|source| RecipeError::Read { path: path.display().to_string(), source })?;
    parse_recipe(&raw, path)
}

fn parse_recipe(raw: &str, path: &Path) -> Result<RecipeBody, RecipeError> {
    let file: RecipeFile = serde_yaml::from_str(raw)
        .map_err(|source| RecipeError::Parse { path: path.display().to_string(), source })?;
    Ok(file.recipe)
}

/// Merge the target want's parameter overrides over the recipe's declared
/// defaults (spec.md §6 step 1: "merges `spec.params` into the recipe's
/// parameter defaults").
pub fn merge_params(defaults: &BTreeMap<String, Value>, overrides: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    let mut merged = defaults.clone();
    for (k, v) in overrides {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Expand `recipe` against `target`, producing concrete owned wants with
/// `{{name}}` placeholders substituted and ids scoped by the target's id to
/// avoid collisions across repeated instantiations of the same recipe
/// (spec.md §6 step 3).
pub fn expand(recipe: &RecipeBody, target: &Want, epoch_ms: u64) -> Vec<Want> {
    let params = merge_params(&recipe.parameters, &target.spec.params);
    recipe.wants.iter().map(|template| instantiate(template, &params, target, epoch_ms)).collect()
}

fn instantiate(template: &WantTemplate, params: &BTreeMap<String, Value>, target: &Want, epoch_ms: u64) -> Want {
    let scoped_name = format!("{}-{}", target.id.as_str(), substitute_name(&template.name, params));
    let mut want = Want::new(scoped_name, template.want_type.clone(), epoch_ms);
    want.owner_references.push(target.id.clone());
    want.labels = template.labels.clone();

    let substituted_params: BTreeMap<String, Value> =
        template.params.iter().map(|(k, v)| (k.clone(), substitute_value(v, params))).collect();

    want.spec = WantSpec {
        params: substituted_params,
        using: Using::new(template.using.clone()),
        requires: template.requires.clone(),
        requires_fatal: template.requires_fatal,
        recipe: None,
        when: template.when.clone(),
        state_subscriptions: Vec::new(),
    };
    want
}

fn substitute_name(name: &str, params: &BTreeMap<String, Value>) -> String {
    crate::template::substitute(name, params)
}
