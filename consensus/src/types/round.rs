use std::fmt::{self, Display, Formatter};

use datasize::DataSize;
use serde::{Deserialize, Serialize};

/// Identifies a voting epoch.
///
/// `block_round` is the height of the block being agreed on, `reject_round` counts how many rounds
/// at that height ended in a reject. Rounds are ordered lexicographically, so a commit at any
/// reject round moves past every reject round of the same height.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    DataSize,
)]
pub struct Round {
    pub block_round: u64,
    pub reject_round: u32,
}

impl Round {
    /// Creates a new round.
    pub const fn new(block_round: u64, reject_round: u32) -> Self {
        Round {
            block_round,
            reject_round,
        }
    }

    /// The round that follows a commit in this round.
    pub fn next_block(self) -> Self {
        Round::new(self.block_round.saturating_add(1), 0)
    }

    /// The round that follows a reject in this round.
    pub fn next_reject(self) -> Self {
        Round::new(self.block_round, self.reject_round.saturating_add(1))
    }
}

impl Display for Round {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.block_round, self.reject_round)
    }
}
