// SPDX-License-Identifier: MIT

//! Error taxonomy (spec.md §7).

use thiserror::Error;

/// The single error taxonomy used across the want store, reconciler, agent
/// dispatch, and Core API. Each variant carries enough context for a caller
/// (REST server, CLI — both out of scope) to map it without re-parsing
/// strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("want not found: {id}")]
    NotFound { id: String },

    #[error("want already exists: {id}")]
    AlreadyExists { id: String },

    #[error("validation failed for {id}: {message}")]
    ValidationFailed { id: String, message: String },

    #[error("capability {tag} unresolved for want {id} (fatal={fatal})")]
    CapabilityUnresolved { id: String, tag: String, fatal: bool },

    #[error("transport failed for agent {agent}: {message}")]
    TransportFailed { agent: String, message: String },

    #[error("timeout: {context}")]
    Timeout { context: String },

    #[error("conflict: {context}")]
    Conflict { context: String },

    #[error("cascade delete of {id} incomplete: {remaining} want(s) still pending")]
    CascadeIncomplete { id: String, remaining: usize },

    #[error("internal invariant violation: {message}")]
    Internal { message: String },
}

impl CoreError {
    /// Transient errors that the reconciler or agent dispatch retries rather
    /// than surfacing directly on the API (spec.md §7).
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::CapabilityUnresolved { fatal, .. } => !fatal,
            CoreError::TransportFailed { .. } => true,
            _ => false,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// A bounded record of a past failure, kept in the want's error history
/// ring buffer (spec.md §7).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorRecord {
    pub epoch_ms: u64,
    pub message: String,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
