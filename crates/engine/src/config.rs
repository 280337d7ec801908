// SPDX-License-Identifier: MIT

//! Environment knobs collected into a single config struct (spec.md §6,
//! SPEC_FULL.md §2 ambient configuration).

use std::time::Duration;

/// Tunables for the reconciler, delivery fabric, scheduler, and agent
/// dispatch. Defaults match the numeric defaults named in spec.md.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Default bounded capacity for a direct producer→consumer channel
    /// (spec.md §4.4: "minimum 1").
    pub channel_buffer_size: usize,
    /// Per-topic pub/sub ring buffer size (spec.md §4.4: "default 100").
    pub pubsub_ring_size: usize,
    /// Scheduler poll interval (spec.md §4.7: "coarse, ≈ 10 s").
    pub scheduler_poll_interval: Duration,
    /// Reconcile tick max interval: a periodic wake fires a reconcile tick
    /// even with no other trigger (spec.md §4.2 point "periodic wake").
    pub reconcile_tick_max_interval: Duration,
    /// Default deadline for a do-agent call (spec.md §5: "default 30 s").
    pub do_agent_deadline: Duration,
    /// Grace period an agent gets to return after cancellation before being
    /// abandoned (spec.md §5: "grace period (5 s)").
    pub cancellation_grace: Duration,
    /// Reconcile ticks a `requires_fatal` want tolerates an unresolved
    /// capability before failing (SPEC_FULL.md §9 Open Question 1).
    pub capability_resolve_grace: u32,
    /// Bearer token shared agents use to authenticate async callbacks
    /// (spec.md §6).
    pub callback_bearer_token: Option<String>,
    /// Capacity of the per-want bounded error-history ring buffer
    /// (SPEC_FULL.md §7).
    pub error_history_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 16,
            pubsub_ring_size: 100,
            scheduler_poll_interval: Duration::from_secs(10),
            reconcile_tick_max_interval: Duration::from_secs(5),
            do_agent_deadline: Duration::from_secs(30),
            cancellation_grace: Duration::from_secs(5),
            capability_resolve_grace: 3,
            callback_bearer_token: None,
            error_history_capacity: 20,
        }
    }
}

impl EngineConfig {
    /// Build a config from `MYWANT_*` environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("MYWANT_CHANNEL_BUFFER_SIZE") {
            if let Ok(parsed) = v.parse() {
                cfg.channel_buffer_size = parsed;
            }
        }
        if let Ok(v) = std::env::var("MYWANT_PUBSUB_RING_SIZE") {
            if let Ok(parsed) = v.parse() {
                cfg.pubsub_ring_size = parsed;
            }
        }
        if let Ok(v) = std::env::var("MYWANT_SCHEDULER_POLL_INTERVAL_MS") {
            if let Ok(parsed) = v.parse() {
                cfg.scheduler_poll_interval = Duration::from_millis(parsed);
            }
        }
        if let Ok(v) = std::env::var("MYWANT_CALLBACK_BEARER_TOKEN") {
            cfg.callback_bearer_token = Some(v);
        }
        cfg
    }
}
