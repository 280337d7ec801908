// SPDX-License-Identifier: MIT

//! Content-hash change detection over a want's canonical serialization
//! (spec.md §4.8): equal hashes suppress reconciliation work for that want.

use mywant_core::Want;
use sha2::{Digest, Sha256};

/// Hash of a want's canonical (serde_json, sorted-key by construction since
/// every map field is a `BTreeMap`) serialization.
pub fn content_hash(want: &Want) -> String {
    let canonical = serde_json::to_vec(want).unwrap_or_default();
    let digest = Sha256::digest(&canonical);
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
