// SPDX-License-Identifier: MIT

//! Scenario 3 (spec.md §8): a target want expands a four-stage recipe with
//! a parameter override; once all four owned wants terminate, the target
//! reaches `achieved` with `state.child_count == 4` (Open Question 3's
//! aggregation policy, pinned here per DESIGN.md).

use crate::common::{build_api, wait_for_status, InstantAchieve};
use mywant_agents::LocalAgentTable;
use mywant_core::{Want, WantStatus};
use mywant_engine::{WantLogic, WantTypeRegistry};
use mywant_recipe::CustomTypeRegistry;
use std::io::Write as _;
use std::sync::Arc;

fn write_queue_recipe(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("queue_of_four.yaml");
    let yaml = r#"
recipe:
  metadata:
    name: queue-of-four
    description: four-stage processing pipeline
  parameters:
    count: 1
  wants:
    - name: "stage-a"
      type: instant
      labels:
        role: stage-a
      params:
        count: "{{count}}"
    - name: "stage-b"
      type: instant
      labels:
        role: stage-b
      using:
        - role: stage-a
    - name: "stage-c"
      type: instant
      labels:
        role: stage-c
      using:
        - role: stage-b
    - name: "stage-d"
      type: instant
      labels:
        role: stage-d
      using:
        - role: stage-c
"#;
    let mut file = std::fs::File::create(&path).expect("create recipe file");
    file.write_all(yaml.as_bytes()).expect("write recipe file");
    path
}

#[tokio::test]
async fn target_with_recipe_expands_to_four_owned_wants_and_aggregates() {
    let type_registry = WantTypeRegistry::new();
    type_registry.register("instant", Arc::new(|_w: &Want| Box::new(InstantAchieve) as Box<dyn WantLogic>));

    let (api, _cancellation) = build_api(type_registry, CustomTypeRegistry::new(), LocalAgentTable::new());

    let dir = tempfile::tempdir().expect("tempdir");
    let recipe_path = write_queue_recipe(&dir);

    let mut target = Want::new("pipeline", "target", 0);
    target.spec.recipe = Some(recipe_path.display().to_string());
    target.spec.params.insert("count".to_string(), serde_json::json!(1000));

    let ids = api.submit_config(vec![target], false).await.expect("submit");
    wait_for_status(&api, &ids[0], WantStatus::Achieved).await;

    let achieved = api.get_want(&ids[0]).expect("get target");
    assert_eq!(achieved.explicit_state.get("child_count"), Some(&serde_json::json!(4)));

    let owned = api.reconciler().store().owned_solely_by(&ids[0]);
    assert_eq!(owned.len(), 4);
}
