//! Delta detection: the signed change between the stored counters and a new
//! snapshot, with the decrease policy applied.
//!
//! Donation counters are cumulative-increasing within a season under normal
//! operation, but the upstream source can report a lower value (API
//! correction, or a player who left and rejoined with a reset counter).
//! What a decrease *means* is a policy question, so it is configurable.

use crate::entities::players::PlayerState;
use serde::Deserialize;

/// How to interpret a snapshot counter that is lower than the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecreasePolicy {
    /// Treat the decrease as noise: the delta is clamped to zero and the
    /// store silently resyncs to the new (lower) value. Trades a small
    /// chance of undercounting for immunity to spurious negative events.
    #[default]
    ClampToZero,
    /// Treat the decrease as a counter reset and take the new absolute
    /// value as the delta, counting everything since the reset.
    RestartFromZero,
}

/// The computed change for one snapshot. Both fields are non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delta {
    pub donations: i64,
    pub received: i64,
}

impl Delta {
    pub const ZERO: Delta = Delta {
        donations: 0,
        received: 0,
    };

    pub fn is_zero(&self) -> bool {
        self.donations == 0 && self.received == 0
    }
}

/// Compute the delta between stored state and a new snapshot.
///
/// A first sighting (`prior` is `None`) always yields a zero delta: the
/// snapshot establishes a baseline, never an event. Otherwise each counter
/// delta is `new - old`, with decreases handled per `policy`.
pub fn detect(
    prior: Option<&PlayerState>,
    donations: i64,
    received: i64,
    policy: DecreasePolicy,
) -> Delta {
    let Some(prior) = prior else {
        return Delta::ZERO;
    };
    Delta {
        donations: counter_delta(prior.donations, donations, policy),
        received: counter_delta(prior.received, received, policy),
    }
}

fn counter_delta(old: i64, new: i64, policy: DecreasePolicy) -> i64 {
    if new >= old {
        new - old
    } else {
        match policy {
            DecreasePolicy::ClampToZero => 0,
            DecreasePolicy::RestartFromZero => new,
        }
    }
}
