// SPDX-License-Identifier: MIT

//! Scenario 2 (spec.md §8): a cyclic want graph — `seed`, `computer`,
//! `merger`, `sink` — computing the first ten Fibonacci numbers through a
//! feedback edge (`merger` relays `computer`'s own output back to it,
//! alongside forwarding to `sink`). Cyclic want graphs are permitted by
//! design (see `graph.rs`'s cycle-tolerant topological order).
//!
//! Per spec.md §4.4, messages merged from more than one producer carry no
//! cross-channel ordering guarantee ("the fabric itself only promises
//! per-channel FIFO"), so this asserts the delivered *multiset* rather than
//! pinning a specific interleaving of `seed`'s and `computer`'s arrivals at
//! `merger`.

use crate::common::{build_api, wait_for_status, Collected, Collector, EmitSeq, Relay};
use mywant_agents::LocalAgentTable;
use mywant_core::{Using, Want, WantStatus};
use mywant_engine::{DefaultClock, Inputs, Outputs, StateHandle, StepOutcome, WantLogic, WantTypeRegistry};
use mywant_recipe::CustomTypeRegistry;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;

/// Keeps a sliding window of the last two observed values and emits their
/// sum for every new value received — from `seed` directly, or looped back
/// from `merger` — until it has produced `target` sums.
struct FibonacciComputer {
    window: VecDeque<i64>,
    target: u32,
    emitted: u32,
}

#[async_trait::async_trait]
impl WantLogic for FibonacciComputer {
    async fn step(&mut self, inputs: &mut Inputs, outputs: &Outputs, _state: &StateHandle<DefaultClock>) -> StepOutcome {
        for (_producer, msg) in inputs.drain_ready() {
            if msg.is_end() {
                continue;
            }
            let Some(v) = msg.body.as_i64() else { continue };
            self.window.push_back(v);
            if self.window.len() > 2 {
                self.window.pop_front();
            }
            if self.window.len() == 2 && self.emitted < self.target {
                let sum = self.window[0] + self.window[1];
                outputs.emit(json!(sum)).await;
                self.emitted += 1;
            }
        }
        if self.emitted >= self.target {
            StepOutcome::Achieved
        } else {
            StepOutcome::Continue
        }
    }
}

#[tokio::test]
async fn feedback_loop_computes_fibonacci_to_sink() {
    let type_registry = WantTypeRegistry::new();
    type_registry.register("emit_seq", Arc::new(|_w: &Want| Box::new(EmitSeq::new([json!(0), json!(1)])) as Box<dyn WantLogic>));
    type_registry.register(
        "fib_computer",
        Arc::new(|_w: &Want| Box::new(FibonacciComputer { window: VecDeque::new(), target: 8, emitted: 0 }) as Box<dyn WantLogic>),
    );
    type_registry.register("relay", Arc::new(|_w: &Want| Box::new(Relay) as Box<dyn WantLogic>));

    let sink = Collected::new();
    let sink_for_factory = sink.clone();
    type_registry.register(
        "collector",
        Arc::new(move |_w: &Want| Box::new(Collector { sink: sink_for_factory.clone(), achieve_on_close: true }) as Box<dyn WantLogic>),
    );

    let (api, _cancellation) = build_api(type_registry, CustomTypeRegistry::new(), LocalAgentTable::new());

    let mut seed = Want::new("seed", "emit_seq", 0);
    seed.labels.insert("role".to_string(), "seed".to_string());

    let mut computer = Want::new("computer", "fib_computer", 0);
    computer.labels.insert("role".to_string(), "computer".to_string());
    computer.spec.using = Using::new(vec![
        [("role".to_string(), "seed".to_string())].into_iter().collect(),
        [("channel".to_string(), "feedback".to_string())].into_iter().collect(),
    ]);

    let mut merger = Want::new("merger", "relay", 0);
    merger.labels =
        [("role".to_string(), "merger".to_string()), ("channel".to_string(), "feedback".to_string())].into_iter().collect();
    merger.spec.using = Using::new(vec![
        [("role".to_string(), "seed".to_string())].into_iter().collect(),
        [("role".to_string(), "computer".to_string())].into_iter().collect(),
    ]);

    let mut sink_want = Want::new("sink", "collector", 0);
    sink_want.spec.using = Using::new(vec![[("role".to_string(), "merger".to_string())].into_iter().collect()]);

    let ids = api.submit_config(vec![seed, computer, merger, sink_want], false).await.expect("submit");
    wait_for_status(&api, &ids[3], WantStatus::Achieved).await;

    let mut observed = sink.snapshot();
    observed.sort_by_key(|v| v.as_i64().unwrap_or_default());
    let mut expected: Vec<Value> = [0, 1, 1, 2, 3, 5, 8, 13, 21, 34].into_iter().map(|n| json!(n)).collect();
    expected.sort_by_key(|v| v.as_i64().unwrap_or_default());

    assert_eq!(observed, expected);
}
