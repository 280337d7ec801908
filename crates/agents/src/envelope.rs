// SPDX-License-Identifier: MIT

//! Wire envelope for webhook and RPC agent calls (spec.md §4.5, §6).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Request sent to a webhook or RPC agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub want_id: String,
    pub agent_name: String,
    pub operation: String,
    pub want_state: BTreeMap<String, Value>,
    pub params: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// Status reported in an [`ExecuteResponse`] or [`WebhookCallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentCallStatus {
    Completed,
    Failed,
    MonitorStarted,
}

/// Response returned synchronously from a webhook/RPC `Execute` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub status: AgentCallStatus,
    #[serde(default)]
    pub state_updates: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

/// Asynchronous callback delivered to the server-exposed callback endpoint
/// after a webhook agent completes work started under `monitor_started` or
/// with a `callback_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookCallback {
    pub agent_name: String,
    pub want_id: String,
    pub status: AgentCallStatus,
    #[serde(default)]
    pub state_updates: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
