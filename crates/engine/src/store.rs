// SPDX-License-Identifier: MIT

//! The want store (spec.md §4.1): process-wide `id -> Want` state behind a
//! reader-writer lock, plus change notification for subscribers.

use crate::config::EngineConfig;
use mywant_core::{CoreError, CoreResult, ErrorRecord, Labels, Selector, Want, WantId, WantStatus};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Emitted on every store mutation a subscriber might care about (§4.1
/// "triggers a state-change notification to subscribers", §4.2 trigger
/// "explicit API call").
#[derive(Debug, Clone)]
pub enum WantEvent {
    Inserted(WantId),
    ParameterUpdated { id: WantId, key: String },
    StateStored { id: WantId, key: String, hidden: bool },
    StatusChanged { id: WantId, from: WantStatus, to: WantStatus },
    Removed(WantId),
}

struct Entry {
    want: Want,
    recent_errors: VecDeque<ErrorRecord>,
}

/// Process-wide state: a mapping id→Want protected by a reader-writer
/// discipline (spec.md §4.1).
pub struct WantStore<C: mywant_core::Clock> {
    clock: C,
    error_history_capacity: usize,
    entries: RwLock<BTreeMap<WantId, Entry>>,
    events: broadcast::Sender<WantEvent>,
}

impl<C: mywant_core::Clock> WantStore<C> {
    pub fn new(clock: C, config: &EngineConfig) -> Self {
        let (events, _rx) = broadcast::channel(1024);
        Self { clock, error_history_capacity: config.error_history_capacity, entries: RwLock::new(BTreeMap::new()), events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WantEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: WantEvent) {
        let _ = self.events.send(event);
    }

    /// Insert a new want. Fails with `AlreadyExists` if the id clashes
    /// (spec.md §4.1).
    pub fn insert(&self, want: Want) -> CoreResult<WantId> {
        let id = want.id.clone();
        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            return Err(CoreError::AlreadyExists { id: id.as_str().to_string() });
        }
        entries.insert(id.clone(), Entry { want, recent_errors: VecDeque::new() });
        drop(entries);
        self.emit(WantEvent::Inserted(id.clone()));
        Ok(id)
    }

    pub fn find_by_id(&self, id: &WantId) -> Option<Want> {
        self.entries.read().get(id).map(|e| e.want.clone())
    }

    /// Wants whose labels satisfy `selector` (every key/value pair present
    /// and equal) — spec.md §4.1.
    pub fn find_by_labels(&self, selector: &Selector) -> Vec<Want> {
        self.entries
            .read()
            .values()
            .filter(|e| mywant_core::selector_matches(selector, &e.want.labels))
            .map(|e| e.want.clone())
            .collect()
    }

    pub fn all(&self) -> Vec<Want> {
        self.entries.read().values().map(|e| e.want.clone()).collect()
    }

    /// First want with a matching name (spec.md §3 `stateSubscriptions`:
    /// `{wantName, keys}` names a want by its human name, not its id). Names
    /// are not required to be unique; this resolves to the first match in
    /// id order, same tie-break the reconciler's tick ordering uses
    /// elsewhere.
    pub fn find_by_name(&self, name: &str) -> Option<Want> {
        self.entries.read().values().find(|e| e.want.name == name).map(|e| e.want.clone())
    }

    pub fn exists(&self, id: &WantId) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Atomic parameter update; appends to history and notifies subscribers
    /// (spec.md §4.1).
    pub fn update_parameter(&self, id: &WantId, key: impl Into<String>, value: Value) -> CoreResult<()> {
        let key = key.into();
        let epoch_ms = self.clock.epoch_ms();
        let mut entries = self.entries.write();
        let entry = entries.get_mut(id).ok_or_else(|| CoreError::NotFound { id: id.as_str().to_string() })?;
        entry.want.update_parameter(key.clone(), value, epoch_ms);
        drop(entries);
        self.emit(WantEvent::ParameterUpdated { id: id.clone(), key });
        Ok(())
    }

    /// Atomic state store. Agent-originated writes to reserved keys are
    /// rejected (spec.md §4.5: "violations are dropped with a warning") —
    /// the caller is expected to log the warning; this returns the error so
    /// the agent dispatch layer can do so with its own context.
    pub fn store_state(&self, id: &WantId, key: impl Into<String>, value: Value, hidden: bool) -> CoreResult<()> {
        let key = key.into();
        if Want::is_reserved_state_key(&key) {
            return Err(CoreError::ValidationFailed { id: id.as_str().to_string(), message: format!("reserved state key: {key}") });
        }
        let epoch_ms = self.clock.epoch_ms();
        let mut entries = self.entries.write();
        let entry = entries.get_mut(id).ok_or_else(|| CoreError::NotFound { id: id.as_str().to_string() })?;
        entry.want.store_state(key.clone(), value, hidden, epoch_ms);
        drop(entries);
        self.emit(WantEvent::StateStored { id: id.clone(), key, hidden });
        Ok(())
    }

    /// Update the mutable portions of a want's spec and labels in place on
    /// re-submit (spec.md §4.2 "update" diff kind): labels, `using`,
    /// `requires`, `recipe`, `when` replace the prior values; `params` are
    /// merged through [`WantStore::update_parameter`]'s last-writer-wins
    /// history so changes remain auditable.
    pub fn update_spec(&self, id: &WantId, labels: Labels, spec: Want) -> CoreResult<()> {
        let epoch_ms = self.clock.epoch_ms();
        for (key, value) in &spec.spec.params {
            let mut entries = self.entries.write();
            if let Some(entry) = entries.get_mut(id) {
                if entry.want.spec.params.get(key) != Some(value) {
                    entry.want.update_parameter(key.clone(), value.clone(), epoch_ms);
                }
            }
        }
        let mut entries = self.entries.write();
        let entry = entries.get_mut(id).ok_or_else(|| CoreError::NotFound { id: id.as_str().to_string() })?;
        entry.want.labels = labels;
        entry.want.spec.using = spec.spec.using;
        entry.want.spec.requires = spec.spec.requires;
        entry.want.spec.requires_fatal = spec.spec.requires_fatal;
        entry.want.spec.recipe = spec.spec.recipe;
        entry.want.spec.when = spec.spec.when;
        entry.want.spec.state_subscriptions = spec.spec.state_subscriptions;
        Ok(())
    }

    pub fn set_achieving_percentage(&self, id: &WantId, pct: u8) -> CoreResult<()> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(id).ok_or_else(|| CoreError::NotFound { id: id.as_str().to_string() })?;
        entry.want.achieving_percentage = pct.min(100);
        Ok(())
    }

    /// Validated status transition (spec.md §4.1): rejects transitions
    /// outside the lifecycle table with `Conflict`.
    pub fn set_status(&self, id: &WantId, next: WantStatus) -> CoreResult<()> {
        let epoch_ms = self.clock.epoch_ms();
        let mut entries = self.entries.write();
        let entry = entries.get_mut(id).ok_or_else(|| CoreError::NotFound { id: id.as_str().to_string() })?;
        let from = entry.want.status;
        if from == next {
            return Ok(());
        }
        if !entry.want.set_status(next, epoch_ms) {
            return Err(CoreError::Conflict { context: format!("invalid transition {from} -> {next} for want {id}") });
        }
        drop(entries);
        self.emit(WantEvent::StatusChanged { id: id.clone(), from, to: next });
        Ok(())
    }

    /// Record a failure in the bounded error-history ring (SPEC_FULL.md §7).
    pub fn record_error(&self, id: &WantId, message: impl Into<String>) -> CoreResult<()> {
        let message = message.into();
        let epoch_ms = self.clock.epoch_ms();
        let mut entries = self.entries.write();
        let entry = entries.get_mut(id).ok_or_else(|| CoreError::NotFound { id: id.as_str().to_string() })?;
        entry.want.record_error(message.clone(), epoch_ms);
        if entry.recent_errors.len() == self.error_history_capacity {
            entry.recent_errors.pop_front();
        }
        entry.recent_errors.push_back(ErrorRecord { epoch_ms, message, resolved: false, notes: None });
        Ok(())
    }

    pub fn recent_errors(&self, id: &WantId) -> Vec<ErrorRecord> {
        self.entries.read().get(id).map(|e| e.recent_errors.iter().cloned().collect()).unwrap_or_default()
    }

    /// Remove a want outright (used by cascade delete, spec.md §4.2 step 6).
    pub fn remove(&self, id: &WantId) -> Option<Want> {
        let removed = self.entries.write().remove(id).map(|e| e.want);
        if removed.is_some() {
            self.emit(WantEvent::Removed(id.clone()));
        }
        removed
    }

    /// Wants owned solely by `owner` (cascade delete target set, spec.md
    /// §3 invariant).
    pub fn owned_solely_by(&self, owner: &WantId) -> Vec<WantId> {
        self.entries.read().iter().filter(|(_, e)| e.want.is_owned_only_by(owner)).map(|(id, _)| id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mywant_core::FakeClock;

    fn store() -> WantStore<FakeClock> {
        WantStore::new(FakeClock::new(), &EngineConfig::default())
    }

    #[test]
    fn insert_then_find_round_trips() {
        let store = store();
        let want = Want::new("a", "generic", 0);
        let id = store.insert(want.clone()).expect("insert should succeed");
        assert_eq!(store.find_by_id(&id).expect("found").name, "a");
    }

    #[test]
    fn duplicate_insert_rejected() {
        let store = store();
        let want = Want::new("a", "generic", 0);
        store.insert(want.clone()).expect("first insert");
        assert!(matches!(store.insert(want), Err(CoreError::AlreadyExists { .. })));
    }

    #[test]
    fn find_by_labels_requires_all_selector_pairs() {
        let store = store();
        let mut want = Want::new("a", "generic", 0);
        want.labels.insert("role".to_string(), "source".to_string());
        store.insert(want).expect("insert");
        let selector = Selector::from([("role".to_string(), "source".to_string())]);
        assert_eq!(store.find_by_labels(&selector).len(), 1);
        let miss = Selector::from([("role".to_string(), "sink".to_string())]);
        assert!(store.find_by_labels(&miss).is_empty());
    }

    #[test]
    fn find_by_name_resolves_a_want_by_its_human_name() {
        let store = store();
        store.insert(Want::new("source", "generic", 0)).expect("insert");
        assert_eq!(store.find_by_name("source").expect("found").name, "source");
        assert!(store.find_by_name("nonexistent").is_none());
    }

    #[test]
    fn reserved_state_key_rejected() {
        let store = store();
        let want = Want::new("a", "generic", 0);
        let id = store.insert(want).expect("insert");
        let err = store.store_state(&id, "status", serde_json::json!("x"), false).unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
    }

    #[test]
    fn invalid_status_transition_rejected_as_conflict() {
        let store = store();
        let want = Want::new("a", "generic", 0);
        let id = store.insert(want).expect("insert");
        let err = store.set_status(&id, WantStatus::Achieved).unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));
    }

    #[test]
    fn error_history_ring_bounded() {
        let mut config = EngineConfig::default();
        config.error_history_capacity = 2;
        let store = WantStore::new(FakeClock::new(), &config);
        let id = store.insert(Want::new("a", "generic", 0)).expect("insert");
        for i in 0..5 {
            store.record_error(&id, format!("err-{i}")).expect("record");
        }
        let recent = store.recent_errors(&id);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "err-3");
        assert_eq!(recent[1].message, "err-4");
    }

    #[tokio::test]
    async fn subscribers_observe_status_change_events() {
        let store = store();
        let mut rx = store.subscribe();
        let id = store.insert(Want::new("a", "generic", 0)).expect("insert");
        let _ = rx.recv().await.expect("inserted event");
        store.set_status(&id, WantStatus::Initializing).expect("transition");
        let event = rx.recv().await.expect("status event");
        assert!(matches!(event, WantEvent::StatusChanged { to: WantStatus::Initializing, .. }));
    }

    #[test]
    fn owned_solely_by_finds_cascade_targets() {
        let store = store();
        let owner_id = store.insert(Want::new("owner", "target", 0)).expect("insert owner");
        let mut child = Want::new("child", "generic", 0);
        child.owner_references.push(owner_id.clone());
        let child_id = store.insert(child).expect("insert child");
        let owned = store.owned_solely_by(&owner_id);
        assert_eq!(owned, vec![child_id]);
    }
}
