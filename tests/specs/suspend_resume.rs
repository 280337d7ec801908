// SPDX-License-Identifier: MIT

//! Scenario 6 (spec.md §8): a generator want would emit 100 messages at
//! 10ms intervals. After 25ms the want is suspended; the consumer should
//! have seen only a handful of messages by then, nothing new arrives while
//! suspended, and the remainder arrive once resumed.

use crate::common::{build_api, wait_for_status, Collected, Collector};
use mywant_agents::LocalAgentTable;
use mywant_core::{Using, Want, WantStatus};
use mywant_engine::{Inputs, Outputs, StateHandle, StepOutcome, WantLogic};
use mywant_recipe::CustomTypeRegistry;
use std::sync::Arc;
use std::time::Duration;

/// Emits `count` integers, sleeping `interval` between each (spec.md §8
/// scenario 6's "100 messages at 10ms intervals" generator).
struct IntervalGenerator {
    next: u32,
    count: u32,
    interval: Duration,
}

#[async_trait::async_trait]
impl WantLogic for IntervalGenerator {
    async fn step(&mut self, _inputs: &mut Inputs, outputs: &Outputs, _state: &StateHandle<mywant_engine::DefaultClock>) -> StepOutcome {
        if self.next >= self.count {
            return StepOutcome::Achieved;
        }
        tokio::time::sleep(self.interval).await;
        outputs.emit(serde_json::json!(self.next)).await;
        self.next += 1;
        StepOutcome::Continue
    }
}

#[tokio::test]
async fn suspend_blocks_delivery_until_resumed() {
    let type_registry = mywant_engine::WantTypeRegistry::new();
    type_registry.register(
        "generator",
        Arc::new(|_w: &Want| {
            Box::new(IntervalGenerator { next: 0, count: 100, interval: Duration::from_millis(10) }) as Box<dyn WantLogic>
        }),
    );
    let sink = Collected::new();
    let sink_for_logic = sink.clone();
    type_registry.register(
        "sink",
        Arc::new(move |_w: &Want| {
            Box::new(Collector { sink: sink_for_logic.clone(), achieve_on_close: true }) as Box<dyn WantLogic>
        }),
    );

    let (api, _cancellation) = build_api(type_registry, CustomTypeRegistry::new(), LocalAgentTable::new());

    let mut generator = Want::new("generator", "generator", 0);
    generator.labels.insert("role".to_string(), "source".to_string());
    let mut consumer = Want::new("sink", "sink", 0);
    consumer.spec.using = Using::new(vec![[("role".to_string(), "source".to_string())].into_iter().collect()]);

    let ids = api.submit_config(vec![generator, consumer], false).await.expect("submit");
    let generator_id = ids[0].clone();

    tokio::time::sleep(Duration::from_millis(25)).await;
    api.suspend(&generator_id).await.expect("suspend");
    wait_for_status(&api, &generator_id, WantStatus::Suspended).await;

    let count_at_suspend = sink.snapshot().len();
    assert!(count_at_suspend <= 4, "expected at most a handful of deliveries before suspension, got {count_at_suspend}");

    tokio::time::sleep(Duration::from_millis(100)).await;
    let count_after_wait = sink.snapshot().len();
    assert_eq!(count_after_wait, count_at_suspend, "no further deliveries should arrive while suspended");

    api.resume(&generator_id).await.expect("resume");
    wait_for_status(&api, &generator_id, WantStatus::Achieved).await;
    wait_for_status(&api, &ids[1], WantStatus::Achieved).await;

    let total = sink.snapshot().len();
    assert_eq!(total, 100);
    assert!(
        total - count_after_wait >= 96,
        "expected at least 96 deliveries after resume, got {}",
        total - count_after_wait
    );
}
