// SPDX-License-Identifier: MIT

//! Delivery fabric (spec.md §4.4): bounded direct channels for order-
//! sensitive producer→consumer pairs, plus a label-topic pub/sub with a
//! bounded replay cache for selector-wired consumers.

use crate::message::Message;
use mywant_core::{canonical_key, Labels};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One end of a direct producer→consumer edge. Cloned senders would defeat
/// the "owned by exactly one producer task" invariant (spec.md §5), so this
/// wraps a plain `mpsc::Sender` without exposing `Clone`.
#[derive(Debug)]
pub struct DirectSender(mpsc::Sender<Message>);

impl DirectSender {
    /// Send, applying producer backpressure when the bounded buffer is full
    /// (spec.md §4.4).
    pub async fn send(&self, msg: Message) -> Result<(), Message> {
        self.0.send(msg).await.map_err(|e| e.0)
    }
}

pub type DirectReceiver = mpsc::Receiver<Message>;

/// Create a bounded direct channel. `capacity` is clamped to a minimum of 1
/// (spec.md §4.4).
pub fn direct_channel(capacity: usize) -> (DirectSender, DirectReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (DirectSender(tx), rx)
}

struct Topic {
    ring: VecDeque<Message>,
    ring_capacity: usize,
    subscribers: Vec<mpsc::Sender<Message>>,
}

impl Topic {
    fn new(ring_capacity: usize) -> Self {
        Self { ring: VecDeque::with_capacity(ring_capacity), ring_capacity, subscribers: Vec::new() }
    }

    fn publish(&mut self, msg: Message) {
        if self.ring.len() == self.ring_capacity {
            self.ring.pop_front();
        }
        self.ring.push_back(msg.clone());
        // Pub/sub decouples: a slow subscriber drops messages instead of
        // blocking the producer (spec.md §4.4 backpressure).
        self.subscribers.retain(|tx| tx.try_send(msg.clone()).is_ok() || !tx.is_closed());
    }
}

/// Label-topic pub/sub with a bounded per-topic replay ring (spec.md §4.4).
///
/// Topic key is the canonical serialization of the producer's labels
/// (sorted `key=value` pairs).
pub struct PubSub {
    ring_capacity: usize,
    subscriber_buffer: usize,
    topics: Mutex<HashMap<String, Topic>>,
}

impl PubSub {
    pub fn new(ring_capacity: usize, subscriber_buffer: usize) -> Self {
        Self { ring_capacity, subscriber_buffer, topics: Mutex::new(HashMap::new()) }
    }

    /// Publish `msg` under the topic keyed by `producer_labels`.
    pub fn publish(&self, producer_labels: &Labels, msg: Message) {
        let key = canonical_key(producer_labels);
        let mut topics = self.topics.lock();
        let topic = topics.entry(key).or_insert_with(|| Topic::new(self.ring_capacity));
        topic.publish(msg);
    }

    /// Subscribe to the topic keyed by `producer_labels`. The returned
    /// receiver first observes the replayed ring buffer contents (in
    /// publication order), then live messages (spec.md §4.4, §8 "pub/sub
    /// replay").
    pub fn subscribe(&self, producer_labels: &Labels) -> mpsc::Receiver<Message> {
        let key = canonical_key(producer_labels);
        let (tx, rx) = mpsc::channel(self.subscriber_buffer.max(1));
        let mut topics = self.topics.lock();
        let topic = topics.entry(key).or_insert_with(|| Topic::new(self.ring_capacity));
        for replayed in &topic.ring {
            // Best-effort: a fresh bounded channel sized to at least the
            // ring capacity should never fill up during replay.
            let _ = tx.try_send(replayed.clone());
        }
        topic.subscribers.push(tx);
        rx
    }

    /// Current subscriber count for the topic keyed by `producer_labels`
    /// (spec.md §4.4: "output count... is the number of current
    /// subscribers").
    pub fn subscriber_count(&self, producer_labels: &Labels) -> usize {
        let key = canonical_key(producer_labels);
        self.topics.lock().get(&key).map(|t| t.subscribers.len()).unwrap_or(0)
    }
}

/// Holds every direct-channel sender keyed by edge, so the reconciler can
/// look one up or tear it down during cascade (spec.md §4.2, §4.4).
#[derive(Default, Clone)]
pub struct ChannelTable {
    inner: Arc<Mutex<HashMap<(String, String), Arc<DirectSender>>>>,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, producer_id: &str, consumer_id: &str, sender: DirectSender) {
        self.inner.lock().insert((producer_id.to_string(), consumer_id.to_string()), Arc::new(sender));
    }

    pub fn get(&self, producer_id: &str, consumer_id: &str) -> Option<Arc<DirectSender>> {
        self.inner.lock().get(&(producer_id.to_string(), consumer_id.to_string())).cloned()
    }

    pub fn remove(&self, producer_id: &str, consumer_id: &str) {
        self.inner.lock().remove(&(producer_id.to_string(), consumer_id.to_string()));
    }

    /// Remove every edge whose producer or consumer is `want_id` (cascade
    /// teardown, spec.md §4.2 step 6).
    pub fn remove_all_for(&self, want_id: &str) {
        self.inner.lock().retain(|(p, c), _| p != want_id && c != want_id);
    }
}
