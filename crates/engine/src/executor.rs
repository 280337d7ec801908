// SPDX-License-Identifier: MIT

//! Per-want executor (spec.md §4.3): one cooperative task per non-terminal
//! want with a defined type, driving its step function to completion.

use crate::config::EngineConfig;
use crate::store::{WantEvent, WantStore};
use crate::want_logic::{Inputs, Outputs, StateHandle, StepOutcome, WantLogic};
use crate::DefaultClock;
use mywant_core::WantId;
use mywant_core::WantStatus;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Control signals a user-driven operation (§6) sends to a running
/// executor task (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Suspend,
    Resume,
    Stop,
    Delete,
}

/// Handle a reconciler holds to talk to a live executor task.
#[derive(Clone)]
pub struct ExecutorHandle {
    pub control: mpsc::Sender<ControlSignal>,
    pub cancellation: CancellationToken,
}

const STEP_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Apply a step's outcome to the store and outputs; returns true once the
/// executor loop should stop. Shared between the poll-timer branch and the
/// state-subscription wake branch so both drive a step the same way.
async fn apply_step_outcome(
    outcome: StepOutcome,
    id: &WantId,
    outputs: &Outputs,
    store: &WantStore<DefaultClock>,
) -> bool {
    match outcome {
        StepOutcome::Continue => false,
        StepOutcome::Achieved => {
            outputs.end().await;
            let _ = store.set_status(id, WantStatus::Achieved);
            let _ = store.set_achieving_percentage(id, 100);
            true
        }
        StepOutcome::Failed(reason) => {
            warn!(want_id = id.as_str(), reason = reason.as_str(), "want executor failed");
            let _ = store.record_error(id, reason);
            outputs.end().await;
            let _ = store.set_status(id, WantStatus::Failed);
            true
        }
    }
}

/// Spawn the executor task for `id`. Returns a handle the reconciler keeps
/// to send control signals and a join handle for the task itself.
///
/// `subscriptions` is this want's resolved `stateSubscriptions` (spec.md
/// §3): each entry names a producer want's id and the explicit-state keys
/// it's watching. A matching `WantEvent::StateStored` from the store wakes
/// the step function immediately instead of waiting for the next poll tick
/// (spec.md §4.1, §4.3 point 1).
pub fn spawn(
    id: WantId,
    mut logic: Box<dyn WantLogic>,
    mut inputs: Inputs,
    outputs: Outputs,
    store: Arc<WantStore<DefaultClock>>,
    _config: Arc<EngineConfig>,
    subscriptions: Vec<(WantId, BTreeSet<String>)>,
) -> (ExecutorHandle, tokio::task::JoinHandle<()>) {
    let (control_tx, mut control_rx) = mpsc::channel(8);
    let cancellation = CancellationToken::new();
    let handle = ExecutorHandle { control: control_tx, cancellation: cancellation.clone() };
    let task_cancellation = cancellation.clone();

    let join = tokio::spawn(async move {
        let state = StateHandle::new(store.clone(), id.clone());
        let _ = store.set_status(&id, WantStatus::Reaching);
        let mut suspended = false;
        let mut events = store.subscribe();

        'outer: loop {
            tokio::select! {
                _ = task_cancellation.cancelled() => {
                    info!(want_id = id.as_str(), "executor cancelled");
                    break 'outer;
                }
                signal = control_rx.recv() => {
                    match signal {
                        Some(ControlSignal::Suspend) => {
                            suspended = true;
                            let _ = store.set_status(&id, WantStatus::Suspended);
                        }
                        Some(ControlSignal::Resume) => {
                            suspended = false;
                            let _ = store.set_status(&id, WantStatus::Reaching);
                        }
                        Some(ControlSignal::Stop) => {
                            outputs.end().await;
                            let _ = store.set_status(&id, WantStatus::Stopped);
                            break 'outer;
                        }
                        Some(ControlSignal::Delete) | None => {
                            break 'outer;
                        }
                    }
                }
                event = events.recv(), if !suspended && !subscriptions.is_empty() => {
                    let woken = match event {
                        Ok(WantEvent::StateStored { id: producer, key, hidden: false }) => {
                            subscriptions.iter().any(|(sub_id, keys)| *sub_id == producer && keys.contains(&key))
                        }
                        Ok(_) => false,
                        // Lagged: a burst of events may have been dropped under load;
                        // fall through to the next poll tick rather than lose the wake.
                        Err(_) => false,
                    };
                    if woken {
                        let outcome = logic.step(&mut inputs, &outputs, &state).await;
                        if apply_step_outcome(outcome, &id, &outputs, &store).await {
                            break 'outer;
                        }
                    }
                }
                _ = tokio::time::sleep(STEP_POLL_INTERVAL), if !suspended => {
                    let outcome = logic.step(&mut inputs, &outputs, &state).await;
                    if apply_step_outcome(outcome, &id, &outputs, &store).await {
                        break 'outer;
                    }
                }
            }
        }
    });

    (handle, join)
}
