// SPDX-License-Identifier: MIT

//! Tracks whether a webhook/RPC agent call is still eligible for an async
//! callback (spec.md §4.5, §6; SPEC_FULL.md §9 Open Question 2).
//!
//! A synchronous `Execute` response that already carries `state_updates`
//! (status `completed`) closes the call out entirely — a callback that
//! arrives afterward for the same `(want_id, agent_name)` pair is mixed-mode
//! and is rejected. A response of `monitor_started` leaves the call open so
//! exactly one later callback can still apply updates.

use crate::envelope::AgentCallStatus;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallState {
    AwaitingCallback,
    Closed,
}

/// Process-wide ledger of in-flight webhook/RPC calls, keyed by
/// `(want_id, agent_name)`. One call is tracked at a time per pair; a fresh
/// dispatch overwrites whatever state the previous call left behind.
#[derive(Default)]
pub struct CallLedger {
    calls: Mutex<HashMap<(String, String), CallState>>,
}

impl CallLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the synchronous response to an `Execute` call. A `completed`
    /// or `failed` status closes the call to further callbacks; a
    /// `monitor_started` status leaves it open.
    pub fn record_response(&self, want_id: &str, agent_name: &str, status: AgentCallStatus) {
        let state = match status {
            AgentCallStatus::MonitorStarted => CallState::AwaitingCallback,
            AgentCallStatus::Completed | AgentCallStatus::Failed => CallState::Closed,
        };
        self.calls.lock().insert((want_id.to_string(), agent_name.to_string()), state);
    }

    /// Whether a callback for `(want_id, agent_name)` should be accepted.
    /// Accepting consumes the open state so a second callback for the same
    /// call is rejected too (at most one callback per call).
    pub fn accept_callback(&self, want_id: &str, agent_name: &str) -> bool {
        let key = (want_id.to_string(), agent_name.to_string());
        let mut calls = self.calls.lock();
        match calls.get(&key) {
            Some(CallState::AwaitingCallback) => {
                calls.insert(key, CallState::Closed);
                true
            }
            _ => false,
        }
    }
}
