//! The messages exchanged by YAC peers.

use std::fmt::{self, Display, Formatter};

use datasize::DataSize;
use derive_more::From;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use yac_hashing::Digest;

use crate::{
    crypto::{PublicKey, Signature},
    types::{Round, YacHash},
};

/// A signed vote of one peer for one candidate hash in one round.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, DataSize)]
pub struct VoteMessage {
    hash: YacHash,
    round: Round,
    signer: PublicKey,
    signature: Signature,
}

impl VoteMessage {
    pub fn new(hash: YacHash, round: Round, signer: PublicKey, signature: Signature) -> Self {
        VoteMessage {
            hash,
            round,
            signer,
            signature,
        }
    }

    /// The digest a vote's signature is made over: the hash of the encoded round and candidate.
    pub fn signing_digest(round: Round, hash: YacHash) -> Result<Digest, bincode::Error> {
        let serialized = bincode::serialize(&(round, hash))?;
        Ok(Digest::hash(serialized))
    }

    pub fn hash(&self) -> &YacHash {
        &self.hash
    }

    pub fn round(&self) -> Round {
        self.round
    }

    pub fn signer(&self) -> &PublicKey {
        &self.signer
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl Display for VoteMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vote by {} for {} in round {}",
            self.signer, self.hash, self.round
        )
    }
}

/// Returns the round all votes share, or `None` if there are no votes or their rounds differ.
fn common_round(votes: &[VoteMessage]) -> Option<Round> {
    votes.iter().map(VoteMessage::round).dedup().exactly_one().ok()
}

/// Proof of agreement: a supermajority of votes for the same hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DataSize)]
pub struct CommitMessage {
    votes: Vec<VoteMessage>,
}

impl CommitMessage {
    pub fn new(votes: Vec<VoteMessage>) -> Self {
        CommitMessage { votes }
    }

    pub fn votes(&self) -> &[VoteMessage] {
        &self.votes
    }

    /// The committed hash, or `None` if the message is empty or its votes disagree.
    pub fn hash(&self) -> Option<YacHash> {
        self.votes.iter().map(|vote| vote.hash).dedup().exactly_one().ok()
    }

    /// The round of the commit, or `None` if the message is empty or its votes disagree.
    pub fn round(&self) -> Option<Round> {
        common_round(&self.votes)
    }
}

/// Proof of non-agreement: votes spread so that no hash can reach a supermajority.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DataSize)]
pub struct RejectMessage {
    votes: Vec<VoteMessage>,
}

impl RejectMessage {
    pub fn new(votes: Vec<VoteMessage>) -> Self {
        RejectMessage { votes }
    }

    pub fn votes(&self) -> &[VoteMessage] {
        &self.votes
    }

    /// The round of the reject, or `None` if the message is empty or its votes disagree.
    pub fn round(&self) -> Option<Round> {
        common_round(&self.votes)
    }
}

/// Any message a peer can send to the engine.
#[derive(Clone, Debug, PartialEq, Eq, From, Serialize, Deserialize, DataSize)]
pub enum YacMessage {
    Vote(VoteMessage),
    Commit(CommitMessage),
    Reject(RejectMessage),
}

impl YacMessage {
    /// The round the message belongs to, if it is well-formed.
    pub fn round(&self) -> Option<Round> {
        match self {
            YacMessage::Vote(vote) => Some(vote.round()),
            YacMessage::Commit(commit) => commit.round(),
            YacMessage::Reject(reject) => reject.round(),
        }
    }

    /// Encodes the message for a transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Decodes a message received from a transport.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

impl Display for YacMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            YacMessage::Vote(vote) => Display::fmt(vote, f),
            YacMessage::Commit(commit) => write!(
                f,
                "commit with {} votes in round {:?}",
                commit.votes.len(),
                commit.round()
            ),
            YacMessage::Reject(reject) => write!(
                f,
                "reject with {} votes in round {:?}",
                reject.votes.len(),
                reject.round()
            ),
        }
    }
}
