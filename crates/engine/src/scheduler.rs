// SPDX-License-Identifier: MIT

//! The scheduler agent (spec.md §4.7): a background task that restarts a
//! want on its `when` temporal triggers without rebuilding the graph.

use crate::reconciler::Reconciler;
use mywant_core::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Drives every want's `when` triggers on a single coarse polling tick
/// (spec.md §4.7: "bounds wake latency to the poll interval").
pub struct Scheduler<C: Clock> {
    reconciler: Arc<Reconciler>,
    clock: C,
    poll_interval: Duration,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(reconciler: Arc<Reconciler>, clock: C, poll_interval: Duration) -> Self {
        Self { reconciler, clock, poll_interval }
    }

    /// Run the scheduler loop until `cancellation` fires.
    pub async fn run(&self, cancellation: CancellationToken) {
        // Multiple `when` entries are merged by earliest next-fire
        // (spec.md §4.7); tracked per want id.
        let mut next_fire: HashMap<String, u64> = HashMap::new();

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    info!("scheduler stopped");
                    return;
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    self.tick(&mut next_fire).await;
                }
            }
        }
    }

    async fn tick(&self, next_fire: &mut HashMap<String, u64>) {
        let now = self.clock.epoch_ms();
        for want in self.reconciler.store().all() {
            if want.spec.when.is_empty() {
                continue;
            }
            let earliest = want
                .spec
                .when
                .iter()
                .filter_map(|trigger| trigger.next_fire_after(now.saturating_sub(1)))
                .min();
            let Some(earliest) = earliest else { continue };

            let tracked = next_fire.entry(want.id.as_str().to_string()).or_insert(earliest);
            if *tracked > earliest {
                *tracked = earliest;
            }
            if now >= *tracked && matches!(want.status, mywant_core::WantStatus::Stopped | mywant_core::WantStatus::Achieved) {
                info!(want_id = want.id.as_str(), "scheduler firing restart");
                if let Err(err) = self.reconciler.start(&want.id).await {
                    warn!(want_id = want.id.as_str(), %err, "scheduler restart failed");
                }
                next_fire.remove(want.id.as_str());
            }
        }
    }
}
