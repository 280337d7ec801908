// SPDX-License-Identifier: MIT

//! Capability and agent definitions (spec.md §3, §4.5).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named grouping of tags an agent declares it provides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub gives: BTreeSet<String>,
}

impl Capability {
    pub fn new(name: impl Into<String>, gives: impl IntoIterator<Item = String>) -> Self {
        Self { name: name.into(), gives: gives.into_iter().collect() }
    }

    pub fn gives_tag(&self, tag: &str) -> bool {
        self.gives.contains(tag)
    }
}

/// Whether an agent is a one-shot executor or a long-running observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Do,
    Monitor,
}

crate::simple_display! {
    AgentKind {
        Do => "do",
        Monitor => "monitor",
    }
}

/// How a dispatched agent call is carried out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Transport {
    /// In-process callback, registered by name in the local agent table.
    Local,
    /// HTTP POST with a JSON envelope, optional async callback URL.
    Webhook { url: String, callback_url: Option<String> },
    /// Length-prefixed JSON-over-TCP RPC.
    Rpc { addr: String, tls: bool },
}

/// An executable unit that contributes capability tags (spec.md §4.5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDef {
    pub name: String,
    pub kind: AgentKind,
    pub capabilities: Vec<String>,
    pub uses: BTreeSet<String>,
    pub transport: Transport,
}

impl AgentDef {
    pub fn new(name: impl Into<String>, kind: AgentKind, transport: Transport) -> Self {
        Self { name: name.into(), kind, capabilities: Vec::new(), uses: BTreeSet::new(), transport }
    }

    pub fn with_capabilities(mut self, caps: impl IntoIterator<Item = String>) -> Self {
        self.capabilities = caps.into_iter().collect();
        self
    }
}
