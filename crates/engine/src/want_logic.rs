// SPDX-License-Identifier: MIT

//! The type-specific step function interface (spec.md §4.3, §9
//! "polymorphism over want types": a registry of type→constructor plus a
//! small capability interface, not a class-inheritance chain).

use crate::delivery::{DirectReceiver, DirectSender, PubSub};
use crate::store::WantStore;
use mywant_core::{Clock, CoreResult, Labels, Want, WantId};
use serde_json::Value;
use std::sync::Arc;

/// Result of one step invocation (spec.md §4.3).
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Continue,
    Achieved,
    Failed(String),
}

/// One resolved input edge, named by its producer's id so a step function
/// that merges several inputs can still tell them apart. `ended` latches
/// once `drain_ready` observes that channel's end-of-stream marker, so
/// `all_closed` never has to re-poll (and potentially eat) the channel.
pub struct Inputs {
    channels: Vec<(WantId, DirectReceiver, bool)>,
}

impl Inputs {
    pub fn new(channels: Vec<(WantId, DirectReceiver)>) -> Self {
        Self { channels: channels.into_iter().map(|(id, rx)| (id, rx, false)).collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Drain every message currently buffered on every input channel,
    /// without blocking. The executor already waited for *some* channel to
    /// have data before invoking the step (spec.md §4.3 point 1); this is
    /// the "read zero or more messages" part of point 2. An `End` message is
    /// still handed to the caller (so a step can react to it) but also
    /// latches that channel's `ended` flag for `all_closed`.
    pub fn drain_ready(&mut self) -> Vec<(WantId, crate::message::Message)> {
        let mut drained = Vec::new();
        for (producer_id, rx, ended) in &mut self.channels {
            while let Ok(msg) = rx.try_recv() {
                if msg.is_end() {
                    *ended = true;
                }
                drained.push((producer_id.clone(), msg));
            }
        }
        drained
    }

    /// True once every input channel has had its end-of-stream marker
    /// observed by `drain_ready` (or there were no inputs to begin with).
    /// Never touches the channel itself, so a message still in flight when
    /// this is checked is left buffered for the next `drain_ready` instead
    /// of being silently consumed and dropped.
    pub fn all_closed(&self) -> bool {
        self.channels.iter().all(|(_, _, ended)| *ended)
    }
}

/// A want's resolved output edges: direct channels to matched consumers
/// plus (always) the pub/sub topic keyed by the producer's own labels, so
/// late subscribers can still observe past messages (spec.md §4.4).
pub struct Outputs {
    producer_id: WantId,
    labels: Labels,
    direct: Vec<DirectSender>,
    pubsub: Arc<PubSub>,
    seq: std::sync::atomic::AtomicU64,
}

impl Outputs {
    pub fn new(producer_id: WantId, labels: Labels, direct: Vec<DirectSender>, pubsub: Arc<PubSub>) -> Self {
        Self { producer_id, labels, direct, pubsub, seq: std::sync::atomic::AtomicU64::new(0) }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
    }

    /// Emit a data message to every matched direct consumer and publish it
    /// on this want's pub/sub topic (spec.md §4.4 fan-out).
    pub async fn emit(&self, body: Value) {
        let msg = crate::message::Message::data(self.producer_id.as_str(), self.next_seq(), body);
        for sender in &self.direct {
            let _ = sender.send(msg.clone()).await;
        }
        self.pubsub.publish(&self.labels, msg);
    }

    /// Signal end-of-stream to every consumer (spec.md §4.4: "close signals
    /// end-of-stream").
    pub async fn end(&self) {
        let msg = crate::message::Message::end(self.producer_id.as_str(), self.next_seq());
        for sender in &self.direct {
            let _ = sender.send(msg.clone()).await;
        }
        self.pubsub.publish(&self.labels, msg);
    }

    /// Number of subscribers currently attached to this want's pub/sub
    /// topic (spec.md §4.4 "output count").
    pub fn output_count(&self) -> usize {
        self.direct.len().max(self.pubsub.subscriber_count(&self.labels))
    }
}

/// A scoped handle into the want store for the step function to mutate its
/// own want's state and achieving percentage without seeing the rest of
/// the store (spec.md §4.3 point 2: "mutate state, update
/// `achieving_percentage`").
pub struct StateHandle<C: Clock> {
    store: Arc<WantStore<C>>,
    id: WantId,
}

impl<C: Clock> StateHandle<C> {
    pub fn new(store: Arc<WantStore<C>>, id: WantId) -> Self {
        Self { store, id }
    }

    pub fn store_state(&self, key: impl Into<String>, value: Value, hidden: bool) -> CoreResult<()> {
        self.store.store_state(&self.id, key, value, hidden)
    }

    pub fn set_achieving_percentage(&self, pct: u8) -> CoreResult<()> {
        self.store.set_achieving_percentage(&self.id, pct)
    }

    pub fn read(&self) -> Option<Want> {
        self.store.find_by_id(&self.id)
    }

    /// Read another want's current state by its human name (spec.md §3
    /// `stateSubscriptions: {wantName, keys}`) — the cross-want read a step
    /// needs once it has been woken by a matching subscription
    /// notification (spec.md §4.1, §4.3 point 1).
    pub fn read_subscribed(&self, want_name: &str, key: &str) -> Option<Value> {
        self.store.find_by_name(want_name)?.explicit_state.get(key).cloned()
    }

    pub fn id(&self) -> &WantId {
        &self.id
    }
}

/// Type-specific step logic for a want (spec.md §4.3). One instance is
/// constructed per live want by the [`crate::type_registry::WantTypeRegistry`]
/// and driven by the per-want executor task.
#[async_trait::async_trait]
pub trait WantLogic: Send {
    /// Perform one step: read available inputs, optionally emit outputs,
    /// optionally mutate state, and report whether the want should keep
    /// running, has achieved its outcome, or has failed.
    async fn step(&mut self, inputs: &mut Inputs, outputs: &Outputs, state: &StateHandle<crate::DefaultClock>) -> StepOutcome;
}
