use std::fmt::{self, Display, Formatter};

use datasize::DataSize;
use serde::{Deserialize, Serialize};

use yac_hashing::Digest;

/// The candidate the cluster votes for: a proposal and the block built from it.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    DataSize,
)]
pub struct YacHash {
    pub proposal_hash: Digest,
    pub block_hash: Digest,
}

impl YacHash {
    /// Creates a new candidate hash.
    pub fn new(proposal_hash: Digest, block_hash: Digest) -> Self {
        YacHash {
            proposal_hash,
            block_hash,
        }
    }

    /// The sentinel meaning "no candidate". Peers vote for it when they have nothing to vote for.
    pub fn empty() -> Self {
        YacHash::new(Digest::ZERO, Digest::ZERO)
    }

    /// Returns `true` if this is the "no candidate" sentinel.
    pub fn is_empty(&self) -> bool {
        self.proposal_hash.is_zero() && self.block_hash.is_zero()
    }
}

impl Display for YacHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "<empty>")
        } else {
            write!(
                f,
                "proposal {}, block {}",
                self.proposal_hash, self.block_hash
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_hash_is_default() {
        assert_eq!(YacHash::empty(), YacHash::default());
        assert!(YacHash::empty().is_empty());
        assert_eq!(YacHash::empty().to_string(), "<empty>");
    }

    #[test]
    fn equality_is_structural() {
        let proposal = Digest::hash(b"proposal");
        let block = Digest::hash(b"block");
        assert_eq!(YacHash::new(proposal, block), YacHash::new(proposal, block));
        assert_ne!(YacHash::new(proposal, block), YacHash::new(block, proposal));
        assert!(!YacHash::new(proposal, Digest::ZERO).is_empty());
    }
}
