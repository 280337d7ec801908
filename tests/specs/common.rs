// SPDX-License-Identifier: MIT

//! Shared fixtures for the end-to-end scenario specs (spec.md §8): a fast
//! [`mywant_engine::EngineConfig`] plus the same `spawn_periodic` /
//! `wait_for_status` shape `reconciler_tests.rs` already uses, generalized
//! to drive a full [`mywant_api::CoreApi`] instead of a bare `Reconciler`.

use mywant_api::CoreApi;
use mywant_core::{WantId, WantStatus};
use mywant_engine::{EngineConfig, Inputs, Outputs, StateHandle, StepOutcome, WantLogic};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A config tuned for fast reconcile/scheduler polling so specs don't wait
/// on the production defaults (10s scheduler tick, 5s reconcile tick).
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        scheduler_poll_interval: Duration::from_millis(10),
        reconcile_tick_max_interval: Duration::from_millis(10),
        ..EngineConfig::default()
    }
}

/// Assembles a `CoreApi` and starts its background reconcile driver — a
/// want parked in `initializing` (retrying capability resolution) or a
/// target waiting on its children otherwise never gets a second look.
pub fn build_api(
    type_registry: mywant_engine::WantTypeRegistry,
    custom_types: mywant_recipe::CustomTypeRegistry,
    local_agents: mywant_agents::LocalAgentTable,
) -> (CoreApi, CancellationToken) {
    let api = CoreApi::new(fast_config(), type_registry, custom_types, local_agents);
    let cancellation = CancellationToken::new();
    let child = cancellation.clone();
    let reconciler = api.reconciler().clone();
    tokio::spawn(async move { reconciler.run_periodic(child).await });
    (api, cancellation)
}

pub async fn wait_for_status(api: &CoreApi, id: &WantId, target: WantStatus) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if api.get_want(id).map(|w| w.status).ok() == Some(target) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("want {id} never reached {target:?}"));
}

/// A buffer a test can inspect from outside the executor task that owns a
/// `Collector`.
#[derive(Clone, Default)]
pub struct Collected(pub Arc<Mutex<Vec<Value>>>);

impl Collected {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Value> {
        self.0.lock().clone()
    }
}

/// Emits each queued value in order, then achieves (spec.md §8 scenario 1,
/// want "A").
pub struct EmitSeq {
    values: VecDeque<Value>,
}

impl EmitSeq {
    pub fn new(values: impl IntoIterator<Item = Value>) -> Self {
        Self { values: values.into_iter().collect() }
    }
}

#[async_trait::async_trait]
impl WantLogic for EmitSeq {
    async fn step(&mut self, _inputs: &mut Inputs, outputs: &Outputs, _state: &StateHandle<mywant_engine::DefaultClock>) -> StepOutcome {
        match self.values.pop_front() {
            Some(v) => {
                outputs.emit(v).await;
                StepOutcome::Continue
            }
            None => StepOutcome::Achieved,
        }
    }
}

/// Forwards every inbound data message to its own outputs unchanged,
/// achieving once every input edge has signalled end-of-stream (spec.md §8
/// scenario 1, want "B").
pub struct Relay;

#[async_trait::async_trait]
impl WantLogic for Relay {
    async fn step(&mut self, inputs: &mut Inputs, outputs: &Outputs, _state: &StateHandle<mywant_engine::DefaultClock>) -> StepOutcome {
        for (_producer, msg) in inputs.drain_ready() {
            if !msg.is_end() {
                outputs.emit(msg.body).await;
            }
        }
        if !inputs.is_empty() && inputs.all_closed() {
            StepOutcome::Achieved
        } else {
            StepOutcome::Continue
        }
    }
}

/// Collects every inbound data message into a shared buffer, optionally
/// achieving once every input edge closes (spec.md §8 scenarios 1, 2, 6).
pub struct Collector {
    pub sink: Collected,
    pub achieve_on_close: bool,
}

#[async_trait::async_trait]
impl WantLogic for Collector {
    async fn step(&mut self, inputs: &mut Inputs, _outputs: &Outputs, _state: &StateHandle<mywant_engine::DefaultClock>) -> StepOutcome {
        for (_producer, msg) in inputs.drain_ready() {
            if !msg.is_end() {
                self.sink.0.lock().push(msg.body);
            }
        }
        if self.achieve_on_close && !inputs.is_empty() && inputs.all_closed() {
            StepOutcome::Achieved
        } else {
            StepOutcome::Continue
        }
    }
}

/// Achieves on its very first step — for scenarios that only exercise
/// capability resolution, recipe expansion, or target aggregation, not
/// long-running execution (same fixture `reconciler_tests.rs` uses).
pub struct InstantAchieve;

#[async_trait::async_trait]
impl WantLogic for InstantAchieve {
    async fn step(&mut self, _inputs: &mut Inputs, outputs: &Outputs, _state: &StateHandle<mywant_engine::DefaultClock>) -> StepOutcome {
        outputs.end().await;
        StepOutcome::Achieved
    }
}
