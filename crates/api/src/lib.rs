// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! mywant-api: the Core API surface (spec.md §6) that an out-of-scope REST
//! server or CLI would consume. Every operation here is a thin,
//! language-neutral wrapper over [`mywant_engine::Reconciler`] plus the
//! capability registry and snapshot import/export.

pub mod patch;

use mywant_agents::{AgentDispatcher, LocalAgentTable, Registry, WebhookCallback};
use mywant_core::{AgentDef, Capability, CoreError, CoreResult, Selector, Want, WantId};
use mywant_engine::{DefaultClock, EngineConfig, Reconciler, WantStore, WantTypeRegistry};
use mywant_recipe::CustomTypeRegistry;
use mywant_storage::{Snapshot, SnapshotError};
use patch::WantPatch;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Every error the Core API surface can return: the store/reconciler
/// taxonomy (spec.md §7) plus snapshot (de)serialization failures.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// A reconciler operation waiting longer than this on the internal mutex is
/// aborted with `Conflict` (spec.md §5).
const RECONCILER_MUTEX_TIMEOUT: Duration = Duration::from_secs(10);

async fn with_mutex_timeout<F, T>(context: &str, fut: F) -> CoreResult<T>
where
    F: Future<Output = CoreResult<T>>,
{
    match tokio::time::timeout(RECONCILER_MUTEX_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(CoreError::Conflict { context: format!("{context}: reconciler mutex contention exceeded 10s") }),
    }
}

/// The Core API surface. Holds the process-wide registries (spec.md §9:
/// "three process-wide registries... initialized once at startup") and the
/// reconciler that drives them.
pub struct CoreApi {
    reconciler: Arc<Reconciler>,
    registry: Arc<Registry>,
}

impl CoreApi {
    /// Assemble a fresh Core API instance. `local_agents` is supplied by the
    /// caller so it can pre-register in-process agent implementations
    /// before anything is submitted.
    pub fn new(
        config: EngineConfig,
        type_registry: WantTypeRegistry,
        custom_types: CustomTypeRegistry,
        local_agents: LocalAgentTable,
    ) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(WantStore::new(DefaultClock::default(), &config));
        let registry = Arc::new(Registry::new());
        let dispatcher = Arc::new(AgentDispatcher::with_deadline(registry.clone(), local_agents, config.do_agent_deadline));
        let reconciler = Arc::new(Reconciler::new(store, type_registry, custom_types, dispatcher, config));
        Self { reconciler, registry }
    }

    /// Direct access to the reconciler, for a caller (e.g. the scheduler
    /// agent, out-of-scope REST server) that needs it alongside the Core
    /// API operations.
    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Submit config (spec.md §6): each new want enters `created`; existing
    /// ids are updated in place. `authoritative` marks a full-config submit
    /// that removes live top-level wants absent from this set.
    pub async fn submit_config(&self, wants: Vec<Want>, authoritative: bool) -> ApiResult<Vec<WantId>> {
        Ok(with_mutex_timeout("submit_config", self.reconciler.submit(wants, authoritative)).await?)
    }

    /// Get want (spec.md §6): full want (metadata, spec, status, state,
    /// history).
    pub fn get_want(&self, id: &WantId) -> ApiResult<Want> {
        self.reconciler.store().find_by_id(id).ok_or_else(|| CoreError::NotFound { id: id.as_str().to_string() }.into())
    }

    /// List wants (spec.md §6), optionally narrowed by a label selector.
    pub fn list_wants(&self, selector: Option<&Selector>) -> Vec<Want> {
        match selector {
            Some(selector) => self.reconciler.store().find_by_labels(selector),
            None => self.reconciler.store().all(),
        }
    }

    /// Update want (spec.md §6): apply a partial spec change, appended to
    /// history through the store's normal parameter/spec-update path.
    pub async fn update_want(&self, id: &WantId, patch: WantPatch) -> ApiResult<()> {
        let current = self.get_want(id)?;
        let mut scratch = current.clone();
        if let Some(using) = patch.using {
            scratch.spec.using = mywant_core::Using::new(using);
        }
        if let Some(requires) = patch.requires {
            scratch.spec.requires = requires;
        }
        if let Some(requires_fatal) = patch.requires_fatal {
            scratch.spec.requires_fatal = requires_fatal;
        }
        if let Some(recipe) = patch.recipe {
            scratch.spec.recipe = recipe;
        }
        if let Some(when) = patch.when {
            scratch.spec.when = when;
        }
        if let Some(state_subscriptions) = patch.state_subscriptions {
            scratch.spec.state_subscriptions = state_subscriptions;
        }
        for (key, value) in patch.params {
            scratch.spec.params.insert(key, value);
        }
        let labels = patch.labels.unwrap_or(current.labels);
        self.reconciler.store().update_spec(id, labels, scratch)?;
        Ok(())
    }

    /// Delete want (spec.md §6): cascade delete; returns once cascade
    /// completes or `CascadeIncomplete` after the reconciler mutex timeout.
    pub async fn delete_want(&self, id: &WantId) -> ApiResult<()> {
        match tokio::time::timeout(RECONCILER_MUTEX_TIMEOUT, self.reconciler.delete(id)).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                let remaining = self.reconciler.store().owned_solely_by(id).len();
                Err(CoreError::CascadeIncomplete { id: id.as_str().to_string(), remaining }.into())
            }
        }
    }

    pub async fn suspend(&self, id: &WantId) -> ApiResult<()> {
        Ok(with_mutex_timeout("suspend", self.reconciler.suspend(id)).await?)
    }

    pub async fn resume(&self, id: &WantId) -> ApiResult<()> {
        Ok(with_mutex_timeout("resume", self.reconciler.resume(id)).await?)
    }

    pub async fn stop(&self, id: &WantId) -> ApiResult<()> {
        Ok(with_mutex_timeout("stop", self.reconciler.stop(id)).await?)
    }

    pub async fn start(&self, id: &WantId) -> ApiResult<()> {
        Ok(with_mutex_timeout("start", self.reconciler.start(id)).await?)
    }

    /// Batch variant of suspend/resume/stop/start (spec.md §6: "id (or id
    /// set, batch)"). Collects every per-id error rather than stopping at
    /// the first failure, so a caller can see the full fallout of a batch.
    pub async fn batch<F, Fut>(&self, ids: &[WantId], op: F) -> Vec<(WantId, ApiResult<()>)>
    where
        F: Fn(WantId) -> Fut,
        Fut: Future<Output = ApiResult<()>>,
    {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let result = op(id.clone()).await;
            if let Err(ref err) = result {
                warn!(want_id = id.as_str(), %err, "batch operation failed for want");
            }
            results.push((id.clone(), result));
        }
        results
    }

    /// Export snapshot (spec.md §6): canonical YAML of the current want set.
    pub fn export_snapshot(&self, include_system: bool) -> ApiResult<String> {
        let wants = self.reconciler.store().all();
        let snapshot = Snapshot::from_wants(wants, include_system, chrono::Utc::now());
        Ok(snapshot.to_yaml()?)
    }

    /// Import snapshot (spec.md §6, §9 "loading a snapshot produces a new
    /// execution id but retains want ids"): any want not already in a
    /// terminal state is reset to `created` so the reconciler re-derives
    /// its executor/dispatch state from scratch under this process's
    /// execution.
    pub async fn import_snapshot(&self, yaml: &str) -> ApiResult<Vec<WantId>> {
        let snapshot = Snapshot::from_yaml(yaml)?;
        let live_ids: std::collections::HashSet<String> =
            self.reconciler.store().all().into_iter().map(|w| w.id.as_str().to_string()).collect();
        snapshot.validate_for_import(&live_ids)?;

        let mut ids = Vec::with_capacity(snapshot.wants.len());
        for mut want in snapshot.wants {
            if !want.status.is_terminal() {
                want.status = mywant_core::WantStatus::Created;
            }
            let id = self.reconciler.store().insert(want)?;
            ids.push(id);
        }
        info!(count = ids.len(), "snapshot imported");
        self.reconciler.reconcile().await?;
        Ok(ids)
    }

    /// Deliver webhook callback (spec.md §4.5, §6; SPEC_FULL.md §9 Open
    /// Question 2): the server-exposed endpoint a webhook agent posts to
    /// once it finishes work started under `monitor_started` or with a
    /// `callback_url`. Rejects with `Conflict` if the bearer token does not
    /// match [`EngineConfig::callback_bearer_token`], or if no call for
    /// `(want_id, agent_name)` is currently awaiting a callback — including
    /// a call that already closed out via a synchronous `completed`/`failed`
    /// response, which would otherwise let a single logical call apply its
    /// state updates twice.
    pub async fn deliver_webhook_callback(&self, callback: WebhookCallback, bearer_token: Option<&str>) -> ApiResult<()> {
        if let Some(expected) = self.reconciler.config().callback_bearer_token.as_deref() {
            if bearer_token != Some(expected) {
                return Err(CoreError::Conflict { context: "webhook callback: bearer token mismatch".to_string() }.into());
            }
        }

        let ledger = self.reconciler.call_ledger();
        if !ledger.accept_callback(&callback.want_id, &callback.agent_name) {
            return Err(CoreError::Conflict {
                context: format!(
                    "webhook callback for want {} agent {} rejected: no call awaiting callback (mixed sync/async use is forbidden)",
                    callback.want_id, callback.agent_name
                ),
            }
            .into());
        }

        let id = WantId::from(callback.want_id.clone());
        if let Some(error) = callback.error {
            warn!(want_id = callback.want_id.as_str(), agent = callback.agent_name.as_str(), %error, "webhook callback reported failure");
        }
        for (key, value) in callback.state_updates {
            if Want::is_reserved_state_key(&key) {
                warn!(want_id = callback.want_id.as_str(), key = key.as_str(), "dropped reserved state key from webhook callback");
                continue;
            }
            self.reconciler.store().store_state(&id, key, value, false)?;
        }
        Ok(())
    }

    /// Register capability (spec.md §6): entry in the capability registry.
    pub fn register_capability(&self, capability: Capability) {
        self.registry.register_capability(capability);
    }

    /// Register agent (spec.md §6): entry in the agent registry.
    pub fn register_agent(&self, agent: AgentDef) {
        self.registry.register_agent(agent);
    }
}
