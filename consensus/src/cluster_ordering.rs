//! The fixed, ordered set of peers voting in a round, and the thresholds derived from its size.

use std::{
    collections::HashSet,
    fmt::{self, Display, Formatter},
};

use datasize::DataSize;
use serde::{Deserialize, Serialize};

use crate::{crypto::PublicKey, Error};

/// A member of the cluster.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, DataSize)]
pub struct Peer {
    address: String,
    public_key: PublicKey,
}

impl Peer {
    pub fn new(address: impl Into<String>, public_key: PublicKey) -> Self {
        Peer {
            address: address.into(),
            public_key,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

impl Display for Peer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.public_key, self.address)
    }
}

/// Returns the smallest number of votes that is strictly more than two thirds of `peer_count`.
pub fn supermajority(peer_count: usize) -> usize {
    peer_count * 2 / 3 + 1
}

/// Returns `true` if `count` votes out of `peer_count` are strictly more than two thirds.
pub fn has_supermajority(count: usize, peer_count: usize) -> bool {
    count >= supermajority(peer_count)
}

/// An immutable, ordered view of the peers voting in one round.
///
/// The order is only relevant to components choosing leaders; for voting it is a set.
#[derive(Clone, Debug, PartialEq, Eq, DataSize)]
pub struct ClusterOrdering {
    peers: Vec<Peer>,
}

impl ClusterOrdering {
    /// Creates an ordering. Fails if `peers` is empty or contains a public key twice.
    pub fn create(peers: Vec<Peer>) -> Result<Self, Error> {
        if peers.is_empty() {
            return Err(Error::EmptyOrdering);
        }
        let mut seen = HashSet::with_capacity(peers.len());
        if let Some(duplicate) = peers.iter().find(|peer| !seen.insert(peer.public_key)) {
            return Err(Error::DuplicatePeer(duplicate.public_key));
        }
        Ok(ClusterOrdering { peers })
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// The number of peers, `N`.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// The number of votes for one hash that constitutes agreement.
    pub fn supermajority(&self) -> usize {
        supermajority(self.peer_count())
    }

    /// The number of votes that can never be part of a supermajority together with the rest:
    /// once this many peers voted against a hash, it cannot be committed.
    pub fn reject_threshold(&self) -> usize {
        self.peer_count() - self.supermajority() + 1
    }

    /// Returns `true` if the key belongs to a peer of this ordering.
    pub fn contains(&self, public_key: &PublicKey) -> bool {
        self.peers.iter().any(|peer| peer.public_key == *public_key)
    }
}
