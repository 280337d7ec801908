// SPDX-License-Identifier: MIT

//! The want entity (spec.md §3).

use crate::labels::{Labels, Using};
use crate::trigger::Trigger;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

crate::define_id! {
    /// Unique identifier for a want instance.
    pub struct WantId("want-");
}

/// Status of a want (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WantStatus {
    Created,
    Initializing,
    Reaching,
    Suspended,
    Stopped,
    Achieved,
    Failed,
    Terminated,
    Deleting,
}

impl WantStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WantStatus::Achieved | WantStatus::Failed | WantStatus::Terminated)
    }

    /// Validate a status transition per the lifecycle table (spec.md §3, §4.3).
    pub fn can_transition_to(&self, next: WantStatus) -> bool {
        use WantStatus::*;
        if *self == next {
            return true;
        }
        match (*self, next) {
            (Created, Initializing) => true,
            (Initializing, Reaching) => true,
            (Initializing, Failed) => true,
            (Reaching, Achieved) => true,
            (Reaching, Failed) => true,
            (Reaching, Suspended) => true,
            (Suspended, Reaching) => true,
            (Reaching, Stopped) => true,
            (Stopped, Reaching) => true,
            (Stopped, Initializing) => true,
            (Achieved, Reaching) => true,
            (_, Deleting) => true,
            (Deleting, Terminated) => true,
            _ => false,
        }
    }
}

crate::simple_display! {
    WantStatus {
        Created => "created",
        Initializing => "initializing",
        Reaching => "reaching",
        Suspended => "suspended",
        Stopped => "stopped",
        Achieved => "achieved",
        Failed => "failed",
        Terminated => "terminated",
        Deleting => "deleting",
    }
}

/// A state-subscription request: observe `keys` on want `want_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSubscription {
    pub want_name: String,
    pub keys: BTreeSet<String>,
}

/// Declared parameters, dependencies, and requirements for a want
/// (spec.md §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WantSpec {
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    #[serde(default)]
    pub using: Using,
    #[serde(default)]
    pub requires: BTreeSet<String>,
    /// Whether an unresolved capability in `requires` is fatal (Open
    /// Question #1, resolved in SPEC_FULL.md §9).
    #[serde(default)]
    pub requires_fatal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<String>,
    #[serde(default)]
    pub when: Vec<Trigger>,
    #[serde(default)]
    pub state_subscriptions: Vec<StateSubscription>,
}

/// Append-only history entry (SPEC_FULL.md §3 supplement).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub seq: u64,
    pub epoch_ms: u64,
    pub kind: HistoryKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryKind {
    StatusChanged { from: WantStatus, to: WantStatus },
    ParameterUpdated { key: String, value: Value },
    StateStored { key: String, hidden: bool },
    Error { message: String },
}

/// The central entity: a declared desired outcome (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Want {
    pub id: WantId,
    pub name: String,
    pub want_type: String,
    pub labels: Labels,
    pub owner_references: Vec<WantId>,
    #[serde(default)]
    pub system_want: bool,
    pub created_at_ms: u64,

    pub spec: WantSpec,

    pub status: WantStatus,

    #[serde(default)]
    pub explicit_state: BTreeMap<String, Value>,
    #[serde(default)]
    pub hidden_state: BTreeMap<String, Value>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub achieving_percentage: u8,

    #[serde(default)]
    next_seq: u64,
}

impl Want {
    pub fn new(name: impl Into<String>, want_type: impl Into<String>, epoch_ms: u64) -> Self {
        let mut w = Self {
            id: WantId::new(),
            name: name.into(),
            want_type: want_type.into(),
            labels: Labels::new(),
            owner_references: Vec::new(),
            system_want: false,
            created_at_ms: epoch_ms,
            spec: WantSpec::default(),
            status: WantStatus::Created,
            explicit_state: BTreeMap::new(),
            hidden_state: BTreeMap::new(),
            history: Vec::new(),
            achieving_percentage: 0,
            next_seq: 0,
        };
        w.push_history(epoch_ms, HistoryKind::StatusChanged { from: WantStatus::Created, to: WantStatus::Created });
        w
    }

    fn push_history(&mut self, epoch_ms: u64, kind: HistoryKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.history.push(HistoryEntry { seq, epoch_ms, kind });
    }

    /// Attempt a status transition, recording history. Returns `false` (and
    /// makes no change) if the transition is invalid per the lifecycle table.
    pub fn set_status(&mut self, next: WantStatus, epoch_ms: u64) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        if self.status == next {
            return true;
        }
        let from = self.status;
        self.status = next;
        self.push_history(epoch_ms, HistoryKind::StatusChanged { from, to: next });
        true
    }

    pub fn update_parameter(&mut self, key: impl Into<String>, value: Value, epoch_ms: u64) {
        let key = key.into();
        self.spec.params.insert(key.clone(), value.clone());
        self.push_history(epoch_ms, HistoryKind::ParameterUpdated { key, value });
    }

    /// Reserved state keys an agent must never write directly (spec.md §4.5).
    pub fn is_reserved_state_key(key: &str) -> bool {
        matches!(key, "status" | "achieving_percentage" | "history")
    }

    pub fn store_state(&mut self, key: impl Into<String>, value: Value, hidden: bool, epoch_ms: u64) {
        let key = key.into();
        if hidden {
            self.hidden_state.insert(key.clone(), value);
        } else {
            self.explicit_state.insert(key.clone(), value);
        }
        self.push_history(epoch_ms, HistoryKind::StateStored { key, hidden });
    }

    pub fn record_error(&mut self, message: impl Into<String>, epoch_ms: u64) {
        self.push_history(epoch_ms, HistoryKind::Error { message: message.into() });
    }

    pub fn is_owned_only_by(&self, owner: &WantId) -> bool {
        self.owner_references.len() == 1 && self.owner_references[0] == *owner
    }
}
