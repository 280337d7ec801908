// SPDX-License-Identifier: MIT

//! Scenario 1 (spec.md §8): `A --using--> B --using--> C`, wired purely by
//! label selectors — no want ever names another by id. `A` emits `1, 2, 3`
//! then achieves; `B` relays everything it sees; `C` observes `1, 2, 3` and
//! all three wants reach `achieved`.

use crate::common::{build_api, wait_for_status, Collected, Collector, EmitSeq, Relay};
use mywant_agents::LocalAgentTable;
use mywant_core::{Using, Want, WantStatus};
use mywant_engine::{WantLogic, WantTypeRegistry};
use mywant_recipe::CustomTypeRegistry;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn linear_pipeline_delivers_in_order_and_all_three_achieve() {
    let type_registry = WantTypeRegistry::new();
    type_registry.register(
        "emit_seq",
        Arc::new(|_w: &Want| Box::new(EmitSeq::new([json!(1), json!(2), json!(3)])) as Box<dyn WantLogic>),
    );
    type_registry.register("relay", Arc::new(|_w: &Want| Box::new(Relay) as Box<dyn WantLogic>));

    let sink = Collected::new();
    let sink_for_factory = sink.clone();
    type_registry.register(
        "collector",
        Arc::new(move |_w: &Want| Box::new(Collector { sink: sink_for_factory.clone(), achieve_on_close: true }) as Box<dyn WantLogic>),
    );

    let (api, _cancellation) = build_api(type_registry, CustomTypeRegistry::new(), LocalAgentTable::new());

    let mut a = Want::new("a", "emit_seq", 0);
    a.labels.insert("role".to_string(), "source".to_string());

    let mut b = Want::new("b", "relay", 0);
    b.labels.insert("role".to_string(), "proc".to_string());
    b.spec.using = Using::new(vec![[("role".to_string(), "source".to_string())].into_iter().collect()]);

    let mut c = Want::new("c", "collector", 0);
    c.spec.using = Using::new(vec![[("role".to_string(), "proc".to_string())].into_iter().collect()]);

    let ids = api.submit_config(vec![a, b, c], false).await.expect("submit");
    for id in &ids {
        wait_for_status(&api, id, WantStatus::Achieved).await;
    }

    assert_eq!(sink.snapshot(), vec![json!(1), json!(2), json!(3)]);
}
