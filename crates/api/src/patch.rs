// SPDX-License-Identifier: MIT

//! The partial-update payload for the "Update want" Core API operation
//! (spec.md §6: "id, partial spec -> Parameter/label/using changes;
//! appended to history").

use mywant_core::{Labels, StateSubscription, Trigger};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Fields left `None`/empty are left untouched on the target want; only the
/// fields present in the patch are applied.
#[derive(Debug, Clone, Default)]
pub struct WantPatch {
    pub labels: Option<Labels>,
    pub params: BTreeMap<String, Value>,
    pub using: Option<Vec<BTreeMap<String, String>>>,
    pub requires: Option<BTreeSet<String>>,
    pub requires_fatal: Option<bool>,
    pub recipe: Option<Option<String>>,
    pub when: Option<Vec<Trigger>>,
    pub state_subscriptions: Option<Vec<StateSubscription>>,
}

impl WantPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_using(mut self, using: Vec<BTreeMap<String, String>>) -> Self {
        self.using = Some(using);
        self
    }
}
