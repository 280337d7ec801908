// SPDX-License-Identifier: MIT

//! Recipe file shape (spec.md §6): `{recipe: {metadata, parameters, wants}}`.

use mywant_core::Trigger;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Top-level recipe document, as read from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeFile {
    pub recipe: RecipeBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, rename = "customType", skip_serializing_if = "Option::is_none")]
    pub custom_type: Option<String>,
}

fn default_version() -> String {
    "1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeBody {
    pub metadata: RecipeMetadata,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    pub wants: Vec<WantTemplate>,
}

/// A single templated want inside a recipe. String-typed fields may contain
/// `{{name}}` placeholders that [`crate::template`] resolves against merged
/// parameters before expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WantTemplate {
    pub name: String,
    #[serde(rename = "type")]
    pub want_type: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    #[serde(default)]
    pub using: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    pub requires: BTreeSet<String>,
    #[serde(default)]
    pub requires_fatal: bool,
    #[serde(default)]
    pub when: Vec<Trigger>,
}
