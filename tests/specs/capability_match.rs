// SPDX-License-Identifier: MIT

//! Scenario 4 (spec.md §8): a want declares `requires: [create_flight]`;
//! the registered `flight_agent` is the only one whose capability gives
//! that tag, so it gets dispatched and its `state_updates` land in the
//! want's state.

use crate::common::{build_api, wait_for_status, InstantAchieve};
use mywant_agents::{ExecuteRequest, ExecuteResponse, LocalAgent, LocalAgentTable};
use mywant_core::{AgentDef, AgentKind, Capability, CoreError, Transport, Want, WantStatus};
use mywant_engine::{WantLogic, WantTypeRegistry};
use mywant_recipe::CustomTypeRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;

struct FlightAgent;

#[async_trait::async_trait]
impl LocalAgent for FlightAgent {
    async fn execute(&self, _request: ExecuteRequest) -> Result<ExecuteResponse, CoreError> {
        Ok(ExecuteResponse {
            status: mywant_agents::AgentCallStatus::Completed,
            state_updates: BTreeMap::from([("booking_id".to_string(), serde_json::json!("flt-001"))]),
            error: None,
            execution_time_ms: 4,
        })
    }
}

#[tokio::test]
async fn capability_match_dispatches_agent_and_applies_state_updates() {
    let type_registry = WantTypeRegistry::new();
    type_registry.register("instant", Arc::new(|_w: &Want| Box::new(InstantAchieve) as Box<dyn WantLogic>));

    let local_agents = LocalAgentTable::new();
    local_agents.register("flight_agent", FlightAgent);

    let (api, _cancellation) = build_api(type_registry, CustomTypeRegistry::new(), local_agents);
    api.register_capability(Capability::new("flight_api_agency", ["create_flight".to_string()]));
    api.register_agent(
        AgentDef::new("flight_agent", AgentKind::Do, Transport::Local).with_capabilities(["flight_api_agency".to_string()]),
    );

    let mut want = Want::new("book-a-flight", "instant", 0);
    want.spec.requires.insert("create_flight".to_string());
    let ids = api.submit_config(vec![want], false).await.expect("submit");

    wait_for_status(&api, &ids[0], WantStatus::Achieved).await;
    let achieved = api.get_want(&ids[0]).expect("get");
    assert_eq!(achieved.explicit_state.get("booking_id"), Some(&serde_json::json!("flt-001")));
}
