// SPDX-License-Identifier: MIT

//! Capability and agent registry (spec.md §4.5).
//!
//! Read-mostly: readers copy the relevant slice before dispatch rather than
//! holding the lock, matching spec.md §5's resource model for the registry.

use mywant_core::{AgentDef, Capability};
use parking_lot::RwLock;

/// Holds all registered capabilities and agents for the process lifetime.
#[derive(Default)]
pub struct Registry {
    capabilities: RwLock<Vec<Capability>>,
    agents: RwLock<Vec<AgentDef>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_capability(&self, cap: Capability) {
        let mut caps = self.capabilities.write();
        if let Some(existing) = caps.iter_mut().find(|c| c.name == cap.name) {
            *existing = cap;
        } else {
            caps.push(cap);
        }
    }

    pub fn register_agent(&self, agent: AgentDef) {
        let mut agents = self.agents.write();
        if let Some(existing) = agents.iter_mut().find(|a| a.name == agent.name) {
            *existing = agent;
        } else {
            agents.push(agent);
        }
    }

    /// Snapshot of all capabilities, for dispatch to consult without holding
    /// the registry lock.
    pub fn capabilities_snapshot(&self) -> Vec<Capability> {
        self.capabilities.read().clone()
    }

    /// Snapshot of all agents in registration order.
    pub fn agents_snapshot(&self) -> Vec<AgentDef> {
        self.agents.read().clone()
    }

    /// Resolve the first agent (by registration order, then name) whose
    /// declared capabilities include some capability whose `gives` contains
    /// `tag` (spec.md §4.5 dispatch rule).
    pub fn resolve(&self, tag: &str) -> Option<AgentDef> {
        let caps = self.capabilities_snapshot();
        let agents = self.agents_snapshot();
        let matching_cap_names: Vec<&str> =
            caps.iter().filter(|c| c.gives_tag(tag)).map(|c| c.name.as_str()).collect();
        if matching_cap_names.is_empty() {
            return None;
        }
        agents
            .into_iter()
            .find(|agent| agent.capabilities.iter().any(|c| matching_cap_names.contains(&c.as_str())))
    }
}
