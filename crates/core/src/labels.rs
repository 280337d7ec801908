// SPDX-License-Identifier: MIT

//! Labels and selectors — the sole coupling surface between wants.
//!
//! A [`Selector`] is a single AND-map of key/value pairs; a want's `using`
//! field is an OR-list of selectors (spec.md §3). No want ever references
//! another want by name: selector matching is the only wiring mechanism.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A want's labels. `BTreeMap` keeps canonical (sorted) iteration order,
/// which the delivery fabric's pub/sub topic key depends on (spec.md §4.4).
pub type Labels = BTreeMap<String, String>;

/// One AND-map of label key/value pairs that must all match.
pub type Selector = BTreeMap<String, String>;

/// An ordered list of selectors; a want matches if it satisfies at least one
/// (selectors are ORed, each selector's pairs are ANDed).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Using(pub Vec<Selector>);

impl Using {
    pub fn new(selectors: Vec<Selector>) -> Self {
        Self(selectors)
    }

    /// Returns true if `labels` satisfies at least one selector in this list.
    pub fn matches(&self, labels: &Labels) -> bool {
        self.0.iter().any(|sel| selector_matches(sel, labels))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Returns true if every key/value pair in `selector` is present in `labels`.
pub fn selector_matches(selector: &Selector, labels: &Labels) -> bool {
    selector.iter().all(|(k, v)| labels.get(k).is_some_and(|lv| lv == v))
}

/// Canonical serialization of a label map: sorted `key=value` pairs joined
/// by `,`. Used as the pub/sub topic key (spec.md §4.4).
pub fn canonical_key(labels: &Labels) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}
