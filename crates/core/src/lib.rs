// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! mywant-core: the want/label/capability data model shared by every other
//! crate in the workspace.

pub mod macros;

pub mod capability;
pub mod clock;
pub mod error;
pub mod labels;
pub mod trigger;
pub mod want;

pub use capability::{AgentDef, AgentKind, Capability, Transport};
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{CoreError, CoreResult, ErrorRecord};
pub use labels::{canonical_key, selector_matches, Labels, Selector, Using};
pub use trigger::{TimeOfDay, Trigger};
pub use want::{HistoryEntry, HistoryKind, StateSubscription, Want, WantId, WantSpec, WantStatus};
