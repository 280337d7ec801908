// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! mywant-engine: the reconciliation-driven runtime (spec.md §4) — the
//! want store, graph builder, per-want executors, delivery fabric, and
//! temporal scheduler that turn submitted configuration into running
//! wants.

pub mod config;
pub mod delivery;
pub mod executor;
pub mod graph;
pub mod message;
pub mod reconciler;
pub mod scheduler;
pub mod store;
pub mod type_registry;
pub mod want_logic;

/// The clock implementation every production `WantStore`/`Reconciler` is
/// built with. Tests that need deterministic time construct their own
/// `WantStore<FakeClock>` directly instead of going through this alias.
pub type DefaultClock = mywant_core::SystemClock;

pub use config::EngineConfig;
pub use delivery::{direct_channel, ChannelTable, DirectReceiver, DirectSender, PubSub};
pub use executor::{ControlSignal, ExecutorHandle};
pub use graph::{resolve_edges, topological_order, Edge};
pub use message::{Message, MessageKind};
pub use reconciler::Reconciler;
pub use scheduler::Scheduler;
pub use store::{WantEvent, WantStore};
pub use type_registry::{WantLogicFactory, WantTypeRegistry};
pub use want_logic::{Inputs, Outputs, StateHandle, StepOutcome, WantLogic};
