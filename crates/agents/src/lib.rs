// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! mywant-agents: capability/agent registry and the transports (local,
//! webhook, rpc) that carry out a resolved agent's work.

pub mod callback;
pub mod dispatch;
pub mod envelope;
pub mod registry;
pub mod retry;
pub mod transport;

pub use callback::CallLedger;
pub use dispatch::{AgentDispatcher, MonitorUpdate};
pub use envelope::{AgentCallStatus, ExecuteRequest, ExecuteResponse, WebhookCallback};
pub use registry::Registry;
pub use transport::{LocalAgent, LocalAgentTable};
