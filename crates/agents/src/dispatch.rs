// SPDX-License-Identifier: MIT

//! Resolves `requires` capability tags to agents and carries out the call
//! over whichever transport the resolved agent declares (spec.md §4.5).

use crate::callback::CallLedger;
use crate::envelope::{AgentCallStatus, ExecuteRequest, ExecuteResponse};
use crate::registry::Registry;
use crate::retry::with_retry;
use crate::transport::{rpc, webhook, LocalAgentTable};
use mywant_core::{AgentDef, AgentKind, CoreError, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default per-call deadline (spec.md §5: "default 30 s for do-agents") used
/// when a caller constructs an [`AgentDispatcher`] without one — production
/// callers (`mywant-api::CoreApi`) always supply `EngineConfig::do_agent_deadline`
/// instead.
pub const DEFAULT_DO_AGENT_DEADLINE: Duration = Duration::from_secs(30);

/// A monitor-agent update delivered asynchronously, outside the inline
/// do-agent call path.
#[derive(Debug, Clone)]
pub struct MonitorUpdate {
    pub want_id: String,
    pub agent_name: String,
    pub response: ExecuteResponse,
}

/// Dispatches do-agent calls inline (with retry) and spawns monitor-agent
/// background loops that report back over a channel.
pub struct AgentDispatcher {
    registry: Arc<Registry>,
    local_agents: LocalAgentTable,
    call_ledger: Arc<CallLedger>,
    do_agent_deadline: Duration,
}

impl AgentDispatcher {
    pub fn new(registry: Arc<Registry>, local_agents: LocalAgentTable) -> Self {
        Self::with_deadline(registry, local_agents, DEFAULT_DO_AGENT_DEADLINE)
    }

    /// Construct a dispatcher whose do-agent/monitor-agent webhook and RPC
    /// calls are bounded by `do_agent_deadline` (spec.md §5) instead of the
    /// module default.
    pub fn with_deadline(registry: Arc<Registry>, local_agents: LocalAgentTable, do_agent_deadline: Duration) -> Self {
        Self { registry, local_agents, call_ledger: Arc::new(CallLedger::new()), do_agent_deadline }
    }

    /// The ledger tracking which in-flight calls are still eligible for an
    /// asynchronous webhook callback (SPEC_FULL.md §9 Open Question 2). The
    /// server-exposed callback endpoint consults this same ledger before
    /// applying a [`crate::WebhookCallback`].
    pub fn call_ledger(&self) -> Arc<CallLedger> {
        self.call_ledger.clone()
    }

    /// Resolve `tag` to an agent, per spec.md §4.5: no agent provides the
    /// tag is a resolution failure the caller turns into `requires_fatal`
    /// handling; this function itself does not know about fatality.
    pub fn resolve(&self, tag: &str) -> Option<AgentDef> {
        self.registry.resolve(tag)
    }

    /// Execute a do-agent call for `tag`, retrying transient transport
    /// failures up to [`crate::retry::MAX_ATTEMPTS`] times.
    pub async fn dispatch_do(&self, tag: &str, mut request: ExecuteRequest) -> Result<ExecuteResponse, CoreError> {
        let agent = self
            .resolve(tag)
            .ok_or_else(|| CoreError::CapabilityUnresolved { id: request.want_id.clone(), tag: tag.to_string(), fatal: false })?;
        request.agent_name = agent.name.clone();
        let want_id = request.want_id.clone();
        let agent_name = agent.name.clone();

        let local_agents = self.local_agents.clone();
        let deadline = self.do_agent_deadline;
        let response = with_retry(&agent.name.clone(), move || {
            let agent = agent.clone();
            let request = request.clone();
            let local_agents = local_agents.clone();
            async move { call_once(&agent, request, &local_agents, deadline).await }
        })
        .await?;
        self.call_ledger.record_response(&want_id, &agent_name, response.status);
        Ok(response)
    }

    /// Resolve and spawn a monitor-agent loop for `tag`. The spawned task
    /// polls (rpc/webhook) or awaits (local) until cancelled, forwarding
    /// every observed state change on `updates`.
    pub fn dispatch_monitor(
        &self,
        tag: &str,
        request: ExecuteRequest,
        updates: mpsc::Sender<MonitorUpdate>,
        cancellation: CancellationToken,
    ) -> Result<(), CoreError> {
        let agent = self
            .resolve(tag)
            .ok_or_else(|| CoreError::CapabilityUnresolved { id: request.want_id.clone(), tag: tag.to_string(), fatal: false })?;
        if agent.kind != AgentKind::Monitor {
            return Err(CoreError::Internal { message: format!("agent {} is not a monitor agent", agent.name) });
        }
        let local_agents = self.local_agents.clone();
        let call_ledger = self.call_ledger.clone();
        let deadline = self.do_agent_deadline;
        tokio::spawn(async move {
            monitor_loop(agent, request, local_agents, call_ledger, updates, cancellation, deadline).await;
        });
        Ok(())
    }
}

async fn call_once(
    agent: &AgentDef,
    request: ExecuteRequest,
    local_agents: &LocalAgentTable,
    deadline: Duration,
) -> Result<ExecuteResponse, CoreError> {
    match &agent.transport {
        Transport::Local => local_agents.invoke(request).await,
        Transport::Webhook { url, .. } => {
            let body = webhook::post_execute(url, "/execute", None, &request, deadline).await?;
            serde_json::from_str(&body)
                .map_err(|e| CoreError::TransportFailed { agent: agent.name.clone(), message: format!("bad webhook response: {e}") })
        }
        Transport::Rpc { addr, .. } => rpc::call(addr, &request, deadline).await,
    }
}

const MONITOR_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(2);

async fn monitor_loop(
    agent: AgentDef,
    request: ExecuteRequest,
    local_agents: LocalAgentTable,
    call_ledger: Arc<CallLedger>,
    updates: mpsc::Sender<MonitorUpdate>,
    cancellation: CancellationToken,
    deadline: Duration,
) {
    info!(agent = agent.name.as_str(), want_id = request.want_id.as_str(), "monitor agent started");
    loop {
        tokio::select! {
            _ = cancellation.cancelled() => {
                info!(agent = agent.name.as_str(), "monitor agent cancelled");
                return;
            }
            result = call_once(&agent, request.clone(), &local_agents, deadline) => {
                match result {
                    Ok(response) => {
                        let done = matches!(response.status, AgentCallStatus::Completed | AgentCallStatus::Failed);
                        call_ledger.record_response(&request.want_id, &agent.name, response.status);
                        let _ = updates
                            .send(MonitorUpdate { want_id: request.want_id.clone(), agent_name: agent.name.clone(), response })
                            .await;
                        if done {
                            return;
                        }
                    }
                    Err(err) => {
                        warn!(agent = agent.name.as_str(), %err, "monitor agent poll failed");
                    }
                }
            }
        }
        tokio::select! {
            _ = cancellation.cancelled() => return,
            _ = tokio::time::sleep(MONITOR_POLL_INTERVAL) => {}
        }
    }
}
