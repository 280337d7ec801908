// SPDX-License-Identifier: MIT

//! The payload that flows along an edge in the delivery fabric.
//!
//! Design note (spec.md §9 "polymorphism over want types"): payloads are a
//! tagged enum rather than an opaque blob, so a consumer merging several
//! input channels can route by kind without type-casing on the producer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message carried on a direct channel or a pub/sub topic.
///
/// `seq` is the producer-local sequence number; consumers that merge
/// several channels are responsible for using it (or timestamps inside
/// `body`) to recover ordering across channels, since the fabric itself
/// only promises per-channel FIFO (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub producer_id: String,
    pub seq: u64,
    pub kind: MessageKind,
    #[serde(default)]
    pub body: Value,
}

/// Discriminator a consumer switches on before looking at `body`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// An ordinary data item.
    Data,
    /// End-of-stream marker: no further messages will arrive on this edge.
    End,
}

impl Message {
    pub fn data(producer_id: impl Into<String>, seq: u64, body: Value) -> Self {
        Self { producer_id: producer_id.into(), seq, kind: MessageKind::Data, body }
    }

    pub fn end(producer_id: impl Into<String>, seq: u64) -> Self {
        Self { producer_id: producer_id.into(), seq, kind: MessageKind::End, body: Value::Null }
    }

    pub fn is_end(&self) -> bool {
        self.kind == MessageKind::End
    }
}
