// SPDX-License-Identifier: MIT

//! The reconciler (spec.md §4.2): the single-threaded tick that diffs
//! submitted configuration against live state, wires the graph, dispatches
//! agents, starts executors, and cascades deletes.

use crate::config::EngineConfig;
use crate::delivery::{direct_channel, ChannelTable, DirectSender, PubSub};
use crate::executor::{self, ControlSignal, ExecutorHandle};
use crate::graph::{resolve_edges, topological_order};
use crate::store::WantStore;
use crate::type_registry::WantTypeRegistry;
use crate::want_logic::{Inputs, Outputs};
use crate::DefaultClock;
use mywant_agents::{AgentCallStatus, AgentDispatcher, ExecuteRequest, MonitorUpdate};
use mywant_core::{AgentKind, CoreError, CoreResult, Want, WantId, WantSpec, WantStatus};
use mywant_recipe::{expand, load_recipe_file, CustomTypeRegistry};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

struct CapabilityTracking {
    unresolved: HashSet<String>,
    fatal_attempts: u32,
}

/// Everything the reconciler needs to drive one want's delivery wiring and
/// agent dispatch plus lifetime-scoped cancellation.
struct RunningWant {
    executor: Option<ExecutorHandle>,
    /// The executor task itself, so a cascade delete can wait out
    /// [`EngineConfig::cancellation_grace`] for it to actually return
    /// before abandoning it (spec.md §5).
    executor_join: Option<tokio::task::JoinHandle<()>>,
    monitor_cancellation: CancellationToken,
}

/// The single-threaded reconcile loop (spec.md §4.2, §5: "the reconciler
/// itself runs on a single task, serializing all graph mutations").
pub struct Reconciler {
    store: Arc<WantStore<DefaultClock>>,
    type_registry: WantTypeRegistry,
    custom_types: CustomTypeRegistry,
    dispatcher: Arc<AgentDispatcher>,
    channel_table: ChannelTable,
    pubsub: Arc<PubSub>,
    config: Arc<EngineConfig>,
    running: Mutex<HashMap<WantId, RunningWant>>,
    pending_outputs: Mutex<HashMap<WantId, Vec<(WantId, DirectSender)>>>,
    capabilities: Mutex<HashMap<WantId, CapabilityTracking>>,
    // Serializes reconcile ticks onto a single logical lane (spec.md §5).
    tick_lock: tokio::sync::Mutex<()>,
}

impl Reconciler {
    pub fn new(
        store: Arc<WantStore<DefaultClock>>,
        type_registry: WantTypeRegistry,
        custom_types: CustomTypeRegistry,
        dispatcher: Arc<AgentDispatcher>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            store,
            type_registry,
            custom_types,
            dispatcher,
            channel_table: ChannelTable::new(),
            pubsub: Arc::new(PubSub::new(config.pubsub_ring_size, config.pubsub_ring_size)),
            config,
            running: Mutex::new(HashMap::new()),
            pending_outputs: Mutex::new(HashMap::new()),
            capabilities: Mutex::new(HashMap::new()),
            tick_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<WantStore<DefaultClock>> {
        &self.store
    }

    pub fn pubsub(&self) -> &Arc<PubSub> {
        &self.pubsub
    }

    /// The dispatcher's call ledger, for a caller (e.g. the Core API's
    /// webhook callback endpoint) that needs to check whether an async
    /// callback is still eligible to apply (SPEC_FULL.md §9 Open Question 2).
    pub fn call_ledger(&self) -> Arc<mywant_agents::CallLedger> {
        self.dispatcher.call_ledger()
    }

    pub fn config(&self) -> &Arc<EngineConfig> {
        &self.config
    }

    /// Submit a set of wants (spec.md §6 "Submit config"). `authoritative`
    /// marks a full-config submit, which removes live top-level wants that
    /// disappeared from the set (spec.md §4.2 step 1: "only applies when
    /// the submit is authoritative — API-level single-want operations
    /// bypass this").
    pub async fn submit(&self, wants: Vec<Want>, authoritative: bool) -> CoreResult<Vec<WantId>> {
        let _guard = self.tick_lock.lock().await;
        let mut assigned = Vec::with_capacity(wants.len());

        if authoritative {
            let submitted_ids: HashSet<String> = wants.iter().map(|w| w.id.as_str().to_string()).collect();
            let to_remove: Vec<WantId> = self
                .store
                .all()
                .into_iter()
                .filter(|w| w.owner_references.is_empty() && !w.system_want && !submitted_ids.contains(w.id.as_str()))
                .map(|w| w.id)
                .collect();
            for id in to_remove {
                self.delete_locked(&id).await?;
            }
        }

        for want in wants {
            if self.store.exists(&want.id) {
                let id = want.id.clone();
                let labels = want.labels.clone();
                self.store.update_spec(&id, labels, want)?;
                assigned.push(id);
            } else {
                let id = self.store.insert(want)?;
                assigned.push(id);
            }
        }

        self.reconcile_locked().await?;
        Ok(assigned)
    }

    /// Run one reconcile tick (spec.md §4.2). Public for API-level explicit
    /// triggers and the periodic wake.
    pub async fn reconcile(&self) -> CoreResult<()> {
        let _guard = self.tick_lock.lock().await;
        self.reconcile_locked().await
    }

    async fn reconcile_locked(&self) -> CoreResult<()> {
        // Step: expand any fresh target wants so their children are visible
        // to this same tick's edge resolution and topological ordering.
        for want in self.store.all() {
            if want.status == WantStatus::Created && want.spec.recipe.is_some() {
                self.expand_target(&want)?;
            }
        }

        let wants = self.store.all();
        let edges = resolve_edges(&wants);
        let ids: Vec<WantId> = wants.iter().map(|w| w.id.clone()).collect();
        let order = topological_order(&ids, &edges);

        for id in order {
            let Some(want) = self.store.find_by_id(&id) else { continue };
            match want.status {
                WantStatus::Created => {
                    self.store.set_status(&id, WantStatus::Initializing)?;
                }
                WantStatus::Initializing => {
                    self.advance_initializing(&want, &edges).await?;
                }
                _ => {}
            }
            if want.spec.recipe.is_some() {
                self.aggregate_target(&id)?;
            }
        }
        Ok(())
    }

    async fn advance_initializing(&self, want: &Want, edges: &[crate::graph::Edge]) -> CoreResult<()> {
        if want.spec.recipe.is_some() {
            // Targets have no step logic of their own; they become
            // "reaching" the instant their children exist, and are
            // aggregated to a terminal state in `aggregate_target`.
            self.store.set_status(&want.id, WantStatus::Reaching)?;
            return Ok(());
        }

        if !want.spec.requires.is_empty() {
            self.ensure_capability_tracking(want);
            self.attempt_capability_resolution(want).await?;
            if self.store.find_by_id(&want.id).map(|w| w.status) == Some(WantStatus::Failed) {
                return Ok(());
            }
            let still_unresolved =
                self.capabilities.lock().get(&want.id).map(|t| !t.unresolved.is_empty()).unwrap_or(false);
            if still_unresolved {
                // Retried on the next tick; the want stays `initializing`
                // until every tag resolves or the fatal grace is exceeded.
                return Ok(());
            }
        }

        if !self.type_registry.contains(&want.want_type) {
            self.store.record_error(&want.id, format!("unknown want type: {}", want.want_type))?;
            self.store.set_status(&want.id, WantStatus::Failed)?;
            return Ok(());
        }

        self.start_executor(want, edges)?;
        Ok(())
    }

    fn ensure_capability_tracking(&self, want: &Want) {
        self.capabilities
            .lock()
            .entry(want.id.clone())
            .or_insert_with(|| CapabilityTracking { unresolved: want.spec.requires.clone(), fatal_attempts: 0 });
    }

    async fn attempt_capability_resolution(&self, want: &Want) -> CoreResult<()> {
        let tags: Vec<String> = {
            let caps = self.capabilities.lock();
            caps.get(&want.id).map(|t| t.unresolved.iter().cloned().collect()).unwrap_or_default()
        };
        if tags.is_empty() {
            return Ok(());
        }

        for tag in tags {
            let request = ExecuteRequest {
                want_id: want.id.as_str().to_string(),
                agent_name: String::new(),
                operation: "execute".to_string(),
                want_state: want.explicit_state.clone(),
                params: want.spec.params.clone(),
                callback_url: None,
            };
            let Some(agent) = self.dispatcher.resolve(&tag) else {
                self.record_capability_failure(want, &tag)?;
                continue;
            };
            match agent.kind {
                AgentKind::Do => match self.dispatcher.dispatch_do(&tag, request).await {
                    Ok(response) => self.apply_agent_response(want, &tag, response)?,
                    Err(_) => self.record_capability_failure(want, &tag)?,
                },
                AgentKind::Monitor => {
                    let cancellation = self.monitor_cancellation(&want.id);
                    let (tx, mut rx) = mpsc::channel::<MonitorUpdate>(8);
                    if self.dispatcher.dispatch_monitor(&tag, request, tx, cancellation).is_ok() {
                        self.mark_capability_resolved(&want.id, &tag);
                        let store = self.store.clone();
                        let want_id = want.id.clone();
                        tokio::spawn(async move {
                            while let Some(update) = rx.recv().await {
                                if update.response.status == AgentCallStatus::Failed {
                                    let _ = store.record_error(&want_id, update.response.error.unwrap_or_default());
                                    continue;
                                }
                                for (key, value) in update.response.state_updates {
                                    if Want::is_reserved_state_key(&key) {
                                        warn!(want_id = want_id.as_str(), key = key.as_str(), "dropped reserved state key from monitor agent");
                                        continue;
                                    }
                                    let _ = store.store_state(&want_id, key, value, false);
                                }
                            }
                        });
                    } else {
                        self.record_capability_failure(want, &tag)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_agent_response(&self, want: &Want, tag: &str, response: mywant_agents::ExecuteResponse) -> CoreResult<()> {
        for (key, value) in response.state_updates {
            if Want::is_reserved_state_key(&key) {
                warn!(want_id = want.id.as_str(), key = key.as_str(), "dropped reserved state key from agent response");
                continue;
            }
            self.store.store_state(&want.id, key, value, false)?;
        }
        self.mark_capability_resolved(&want.id, tag);
        Ok(())
    }

    fn mark_capability_resolved(&self, id: &WantId, tag: &str) {
        if let Some(tracking) = self.capabilities.lock().get_mut(id) {
            tracking.unresolved.remove(tag);
        }
    }

    fn record_capability_failure(&self, want: &Want, tag: &str) -> CoreResult<()> {
        let mut caps = self.capabilities.lock();
        let tracking = caps.entry(want.id.clone()).or_insert_with(|| CapabilityTracking {
            unresolved: want.spec.requires.clone(),
            fatal_attempts: 0,
        });
        if want.spec.requires_fatal {
            tracking.fatal_attempts += 1;
            if tracking.fatal_attempts >= self.config.capability_resolve_grace {
                drop(caps);
                self.store.record_error(&want.id, format!("capability unresolved: {tag}"))?;
                self.store.set_status(&want.id, WantStatus::Failed)?;
            }
        }
        Ok(())
    }

    fn monitor_cancellation(&self, id: &WantId) -> CancellationToken {
        self.running
            .lock()
            .entry(id.clone())
            .or_insert_with(|| RunningWant { executor: None, executor_join: None, monitor_cancellation: CancellationToken::new() })
            .monitor_cancellation
            .clone()
    }

    fn start_executor(&self, want: &Want, edges: &[crate::graph::Edge]) -> CoreResult<()> {
        if self.running.lock().get(&want.id).and_then(|r| r.executor.as_ref()).is_some() {
            return Ok(());
        }
        let Some(logic) = self.type_registry.construct(want) else {
            return Ok(());
        };

        let mut input_channels = Vec::new();
        for edge in edges.iter().filter(|e| e.consumer == want.id) {
            let producer_id = edge.producer.clone();
            let already_spawned = self.running.lock().get(&producer_id).and_then(|r| r.executor.as_ref()).is_some();
            if already_spawned {
                let producer_labels =
                    self.store.find_by_id(&producer_id).map(|w| w.labels).unwrap_or_default();
                let rx = self.pubsub.subscribe(&producer_labels);
                input_channels.push((producer_id, rx));
            } else {
                let (tx, rx) = direct_channel(self.config.channel_buffer_size);
                self.pending_outputs.lock().entry(producer_id.clone()).or_default().push((want.id.clone(), tx));
                input_channels.push((producer_id, rx));
            }
        }

        let direct_outputs: Vec<DirectSender> =
            self.pending_outputs.lock().remove(&want.id).unwrap_or_default().into_iter().map(|(_, tx)| tx).collect();

        let outputs = Outputs::new(want.id.clone(), want.labels.clone(), direct_outputs, self.pubsub.clone());
        let inputs = Inputs::new(input_channels);

        // Resolve each `stateSubscriptions` entry (spec.md §3) from the
        // human-readable want name it names down to the producer's id, the
        // key the store's `WantEvent`s are actually tagged with.
        let subscriptions: Vec<(WantId, BTreeSet<String>)> = want
            .spec
            .state_subscriptions
            .iter()
            .filter_map(|sub| self.store.find_by_name(&sub.want_name).map(|producer| (producer.id, sub.keys.clone())))
            .collect();

        let (handle, join) =
            executor::spawn(want.id.clone(), logic, inputs, outputs, self.store.clone(), self.config.clone(), subscriptions);
        let mut running = self.running.lock();
        let entry = running.entry(want.id.clone()).or_insert_with(|| RunningWant {
            executor: None,
            executor_join: None,
            monitor_cancellation: CancellationToken::new(),
        });
        entry.executor = Some(handle);
        entry.executor_join = Some(join);
        drop(running);
        info!(want_id = want.id.as_str(), want_type = want.want_type.as_str(), "executor started");
        Ok(())
    }

    fn expand_target(&self, target: &Want) -> CoreResult<()> {
        let (recipe_path, params) = if let Some(path) = &target.spec.recipe {
            (PathBuf::from(path), target.spec.params.clone())
        } else if let Some(entry) = self.custom_types.lookup(&target.want_type) {
            let mut merged = entry.default_params.clone();
            for (k, v) in &target.spec.params {
                merged.insert(k.clone(), v.clone());
            }
            (entry.recipe_path, merged)
        } else {
            return Ok(());
        };

        let body = load_recipe_file(&recipe_path)
            .map_err(|e| CoreError::ValidationFailed { id: target.id.as_str().to_string(), message: e.to_string() })?;

        let mut scoped_target = target.clone();
        scoped_target.spec = WantSpec { params, ..scoped_target.spec.clone() };
        let children = expand(&body, &scoped_target, 0);
        let child_count = children.len();
        for child in children {
            self.store.insert(child)?;
        }
        self.store.store_state(&target.id, "child_count", serde_json::json!(child_count), false)?;
        Ok(())
    }

    fn aggregate_target(&self, target_id: &WantId) -> CoreResult<()> {
        let Some(target) = self.store.find_by_id(target_id) else { return Ok(()) };
        if target.status.is_terminal() || target.status != WantStatus::Reaching {
            return Ok(());
        }
        let children_ids = self.store.owned_solely_by(target_id);
        if children_ids.is_empty() {
            return Ok(());
        }
        let children: Vec<Want> = children_ids.iter().filter_map(|id| self.store.find_by_id(id)).collect();
        if children.iter().any(|c| c.status == WantStatus::Failed) {
            self.store.record_error(target_id, "at least one owned want failed")?;
            self.store.set_status(target_id, WantStatus::Failed)?;
            return Ok(());
        }
        if children.iter().all(|c| c.status == WantStatus::Achieved) {
            self.store.set_status(target_id, WantStatus::Achieved)?;
            self.store.set_achieving_percentage(target_id, 100)?;
        }
        Ok(())
    }

    /// Delete a want and cascade to anything it solely owns (spec.md §4.2
    /// step 6, §8 "cascade").
    pub async fn delete(&self, id: &WantId) -> CoreResult<()> {
        let _guard = self.tick_lock.lock().await;
        self.delete_locked(id).await
    }

    async fn delete_locked(&self, id: &WantId) -> CoreResult<()> {
        let owned = self.store.owned_solely_by(id);
        for child in owned {
            Box::pin(self.delete_locked(&child)).await?;
        }

        if let Some(running) = self.running.lock().remove(id) {
            running.monitor_cancellation.cancel();
            if let Some(handle) = running.executor {
                let _ = handle.control.send(ControlSignal::Delete).await;
                handle.cancellation.cancel();
            }
            // spec.md §5: "agents must return within a grace period (5 s)
            // or are abandoned" — wait out the configured grace before
            // giving up on the executor task (and whatever agent call it
            // may be mid-flight on) so a cascade delete doesn't hang on a
            // stuck want forever.
            if let Some(join) = running.executor_join {
                if tokio::time::timeout(self.config.cancellation_grace, join).await.is_err() {
                    warn!(want_id = id.as_str(), "executor did not return within cancellation grace period, abandoning");
                }
            }
        }
        self.channel_table.remove_all_for(id.as_str());
        self.capabilities.lock().remove(id);
        self.pending_outputs.lock().remove(id);
        self.store.remove(id);
        Ok(())
    }

    /// Suspend a running want (spec.md §6).
    pub async fn suspend(&self, id: &WantId) -> CoreResult<()> {
        self.send_control(id, ControlSignal::Suspend).await
    }

    pub async fn resume(&self, id: &WantId) -> CoreResult<()> {
        self.send_control(id, ControlSignal::Resume).await
    }

    pub async fn stop(&self, id: &WantId) -> CoreResult<()> {
        self.send_control(id, ControlSignal::Stop).await
    }

    /// Restart a stopped/achieved want (spec.md §6 "Start", §4.7
    /// scheduler restart): reset to `initializing` without rebuilding the
    /// graph, and let the next reconcile tick spawn a fresh executor.
    pub async fn start(&self, id: &WantId) -> CoreResult<()> {
        let _guard = self.tick_lock.lock().await;
        self.running.lock().remove(id);
        self.store.set_status(id, WantStatus::Reaching)?;
        let Some(want) = self.store.find_by_id(id) else {
            return Err(CoreError::NotFound { id: id.as_str().to_string() });
        };
        let wants = self.store.all();
        let edges = resolve_edges(&wants);
        self.start_executor(&want, &edges)
    }

    async fn send_control(&self, id: &WantId, signal: ControlSignal) -> CoreResult<()> {
        let handle = self.running.lock().get(id).and_then(|r| r.executor.clone());
        let Some(handle) = handle else {
            return Err(CoreError::Conflict { context: format!("want {id} has no running executor") });
        };
        handle.control.send(signal).await.map_err(|_| CoreError::Conflict { context: format!("want {id} executor already stopped") })
    }

    /// Periodic reconcile wake (spec.md §4.2 "periodic wake"): re-runs a
    /// tick on a fixed interval even with no other trigger, so e.g. target
    /// aggregation and capability retries pick up progress that happened
    /// between explicit triggers.
    pub async fn run_periodic(&self, cancellation: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    info!("periodic reconcile loop stopped");
                    return;
                }
                _ = tokio::time::sleep(self.config.reconcile_tick_max_interval) => {
                    if let Err(err) = self.reconcile().await {
                        warn!(%err, "periodic reconcile tick failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
