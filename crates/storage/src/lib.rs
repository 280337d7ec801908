// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! mywant-storage: snapshot export/import and content-hash change detection.

pub mod hash;
pub mod snapshot;

pub use hash::content_hash;
pub use snapshot::{read_snapshot_file, rotate_bak_path, write_snapshot_file, Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
