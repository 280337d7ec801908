// SPDX-License-Identifier: MIT

//! Temporal triggers for the scheduler agent (spec.md §4.7).

use serde::{Deserialize, Serialize};

/// Absolute time-of-day, `HH:MM` in the engine's local clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Self {
        Self { hour, minute }
    }

    /// Milliseconds since midnight.
    pub fn as_ms(&self) -> u64 {
        (self.hour as u64 * 3600 + self.minute as u64 * 60) * 1000
    }
}

/// One `{at?, every?}` schedule entry (spec.md §3, §4.7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Trigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<TimeOfDay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every_ms: Option<u64>,
}

impl Trigger {
    /// Compute the next fire time (epoch ms) strictly after `now_ms`.
    ///
    /// - `at` only: aligns to the next occurrence of that time-of-day.
    /// - `every` only: `now + every`.
    /// - both: align to `at`, then repeat every `every` thereafter.
    pub fn next_fire_after(&self, now_ms: u64) -> Option<u64> {
        const DAY_MS: u64 = 86_400_000;
        match (self.at, self.every_ms) {
            (None, None) => None,
            (None, Some(every)) => {
                if every == 0 {
                    None
                } else {
                    Some(now_ms + every)
                }
            }
            (Some(at), every) => {
                let day_start = now_ms - (now_ms % DAY_MS);
                let mut candidate = day_start + at.as_ms();
                if let Some(every) = every {
                    if every > 0 {
                        while candidate <= now_ms {
                            candidate += every;
                        }
                        return Some(candidate);
                    }
                }
                if candidate <= now_ms {
                    candidate += DAY_MS;
                }
                Some(candidate)
            }
        }
    }
}
