use serde_derive::{Deserialize, Serialize};

/// The number of intervals a slot is divided into. A block is "timely" (and eligible for the
/// proposer boost) when it arrives within the first interval of its slot.
pub const INTERVALS_PER_SLOT: u64 = 3;

/// The subset of chain configuration that influences fork choice.
///
/// A `ChainSpec` is a plain value owned by whoever instantiates the engine; there is no global
/// configuration. This keeps multiple independent chains (e.g., in tests) possible within one
/// process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSpec {
    pub seconds_per_slot: u64,
    pub slots_per_epoch: u64,
    /// Percentage of the total active balance awarded to a timely block proposal. `None`
    /// disables proposer boosting entirely.
    pub proposer_score_boost: Option<u64>,
}

impl ChainSpec {
    pub fn mainnet() -> Self {
        Self {
            seconds_per_slot: 12,
            slots_per_epoch: 32,
            proposer_score_boost: Some(40),
        }
    }

    /// A small-scale configuration for interop testing: one-second slots, eight-slot epochs.
    pub fn minimal() -> Self {
        Self {
            seconds_per_slot: 6,
            slots_per_epoch: 8,
            ..Self::mainnet()
        }
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::mainnet()
    }
}
