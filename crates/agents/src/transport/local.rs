// SPDX-License-Identifier: MIT

//! In-process agent transport: callbacks registered by name (spec.md §4.5).

use crate::envelope::{AgentCallStatus, ExecuteRequest, ExecuteResponse};
use async_trait::async_trait;
use mywant_core::CoreError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A locally-registered do/monitor agent implementation.
#[async_trait]
pub trait LocalAgent: Send + Sync {
    async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteResponse, CoreError>;
}

type BoxedLocalAgent = Arc<dyn LocalAgent>;

/// Registry of in-process agent implementations, keyed by agent name.
#[derive(Default, Clone)]
pub struct LocalAgentTable {
    agents: Arc<RwLock<HashMap<String, BoxedLocalAgent>>>,
}

impl LocalAgentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, agent_name: impl Into<String>, agent: impl LocalAgent + 'static) {
        self.agents.write().insert(agent_name.into(), Arc::new(agent));
    }

    pub async fn invoke(&self, request: ExecuteRequest) -> Result<ExecuteResponse, CoreError> {
        let agent = self
            .agents
            .read()
            .get(&request.agent_name)
            .cloned()
            .ok_or_else(|| CoreError::TransportFailed {
                agent: request.agent_name.clone(),
                message: "no local agent registered under that name".to_string(),
            })?;
        agent.execute(request).await
    }
}
