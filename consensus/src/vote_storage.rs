//! Accumulation of the votes of a single round and detection of its outcome.

use std::collections::{BTreeSet, HashSet};

use datasize::DataSize;
use tracing::warn;

use crate::{
    cluster_ordering::ClusterOrdering,
    crypto::PublicKey,
    messages::{CommitMessage, RejectMessage, VoteMessage},
    types::{Round, YacHash},
};

/// The result of inserting a vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The vote was new and has been recorded.
    Inserted,
    /// The signer already voted for this hash in this round. Nothing changed.
    Duplicate,
    /// The vote belongs to a different round. Nothing changed.
    WrongRound,
    /// The signer is not a member of the round's cluster. Nothing changed.
    UnknownPeer,
}

/// What the votes collected so far prove.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageState {
    /// Neither agreement nor non-agreement is proven yet.
    Pending,
    /// A supermajority voted for the same hash.
    Committed(CommitMessage),
    /// No hash can reach a supermajority any more.
    Rejected(RejectMessage),
}

/// The votes received in one round.
///
/// Each peer's vote for a given hash is stored at most once. A peer voting for several hashes is
/// an equivocator: all of its votes are kept, and it counts once for every hash it voted for, but
/// it only counts once towards the number of peers that have voted at all.
#[derive(Debug, DataSize)]
pub struct VoteStorage {
    round: Round,
    ordering: ClusterOrdering,
    /// Every accepted vote, in arrival order.
    votes: Vec<VoteMessage>,
    /// For each hash, in the order the hashes were first seen, the indices of its votes in
    /// `votes`.
    by_hash: Vec<(YacHash, Vec<usize>)>,
    /// The peers that have voted, for any hash.
    voters: HashSet<PublicKey>,
    equivocators: BTreeSet<PublicKey>,
}

impl VoteStorage {
    /// Creates an empty storage for the given round.
    pub fn new(round: Round, ordering: ClusterOrdering) -> Self {
        VoteStorage {
            round,
            ordering,
            votes: Vec::new(),
            by_hash: Vec::new(),
            voters: HashSet::new(),
            equivocators: BTreeSet::new(),
        }
    }

    pub fn round(&self) -> Round {
        self.round
    }

    pub fn ordering(&self) -> &ClusterOrdering {
        &self.ordering
    }

    /// All accepted votes, in arrival order.
    pub fn votes(&self) -> &[VoteMessage] {
        &self.votes
    }

    /// The number of distinct peers that have voted.
    pub fn voter_count(&self) -> usize {
        self.voters.len()
    }

    /// The peers that voted for more than one hash.
    pub fn equivocators(&self) -> &BTreeSet<PublicKey> {
        &self.equivocators
    }

    /// Records a vote, unless it is a duplicate or doesn't belong to this round's cluster.
    ///
    /// This does _not_ verify the signature.
    pub fn insert(&mut self, vote: VoteMessage) -> InsertOutcome {
        if vote.round() != self.round {
            return InsertOutcome::WrongRound;
        }
        if !self.ordering.contains(vote.signer()) {
            return InsertOutcome::UnknownPeer;
        }
        let index = self.votes.len();
        let signer = *vote.signer();
        let position = self.by_hash.iter().position(|(hash, _)| hash == vote.hash());
        match position {
            Some(position) => {
                let indices = &mut self.by_hash[position].1;
                if indices
                    .iter()
                    .any(|&other| *self.votes[other].signer() == signer)
                {
                    return InsertOutcome::Duplicate;
                }
                indices.push(index);
            }
            None => self.by_hash.push((*vote.hash(), vec![index])),
        }
        if !self.voters.insert(signer) {
            warn!(
                %signer,
                round = %self.round,
                hash = %vote.hash(),
                "peer voted for more than one hash"
            );
            self.equivocators.insert(signer);
        }
        self.votes.push(vote);
        InsertOutcome::Inserted
    }

    /// The number of distinct peers that voted for `hash`.
    pub fn vote_count(&self, hash: &YacHash) -> usize {
        self.by_hash
            .iter()
            .find(|(other, _)| other == hash)
            .map_or(0, |(_, indices)| indices.len())
    }

    /// Returns `true` if a supermajority voted for `hash`.
    pub fn is_supermajority_reached(&self, hash: &YacHash) -> bool {
        self.vote_count(hash) >= self.ordering.supermajority()
    }

    /// Returns `true` if no hash can reach a supermajority, even if every peer that hasn't voted
    /// yet votes for the currently most popular one.
    pub fn is_reject_proven(&self) -> bool {
        let best_count = self
            .by_hash
            .iter()
            .map(|(_, indices)| indices.len())
            .max()
            .unwrap_or(0);
        let not_voted = self.ordering.peer_count() - self.voters.len();
        best_count + not_voted < self.ordering.supermajority()
    }

    /// Returns the outcome proven by the votes so far.
    ///
    /// If a hash has a supermajority, the commit contains exactly its votes. Otherwise, if reject
    /// is proven, the reject contains every vote. In both cases votes are in arrival order.
    pub fn state(&self) -> StorageState {
        let supermajority = self.ordering.supermajority();
        let committed = self
            .by_hash
            .iter()
            .find(|(_, indices)| indices.len() >= supermajority);
        if let Some((_, indices)) = committed {
            let votes = indices.iter().map(|&i| self.votes[i].clone()).collect();
            return StorageState::Committed(CommitMessage::new(votes));
        }
        if self.is_reject_proven() {
            return StorageState::Rejected(RejectMessage::new(self.votes.clone()));
        }
        StorageState::Pending
    }
}

#[cfg(test)]
mod tests {
    use yac_hashing::Digest;

    use super::*;
    use crate::{
        cluster_ordering::Peer,
        crypto::{SecretKey, Signature},
    };

    const ROUND: Round = Round::new(1, 0);

    fn key(i: u8) -> PublicKey {
        SecretKey::from_bytes([i; SecretKey::LENGTH])
            .unwrap()
            .public_key()
    }

    fn storage(peer_count: u8) -> VoteStorage {
        let peers = (0..peer_count)
            .map(|i| Peer::new(format!("peer-{}", i), key(i)))
            .collect();
        VoteStorage::new(ROUND, ClusterOrdering::create(peers).unwrap())
    }

    fn hash(name: &str) -> YacHash {
        YacHash::new(Digest::hash(name), Digest::hash(name))
    }

    /// Storage doesn't check signatures, so a placeholder is enough.
    fn vote(peer: u8, hash: YacHash) -> VoteMessage {
        VoteMessage::new(
            hash,
            ROUND,
            key(peer),
            Signature::from_bytes([0; Signature::LENGTH]),
        )
    }

    #[test]
    fn commits_at_supermajority() {
        let mut storage = storage(4);
        let h = hash("h");
        assert_eq!(storage.insert(vote(0, h)), InsertOutcome::Inserted);
        assert_eq!(storage.insert(vote(1, h)), InsertOutcome::Inserted);
        assert!(!storage.is_supermajority_reached(&h));
        assert_eq!(storage.state(), StorageState::Pending);

        assert_eq!(storage.insert(vote(2, h)), InsertOutcome::Inserted);
        assert!(storage.is_supermajority_reached(&h));
        let expected = CommitMessage::new(vec![vote(0, h), vote(1, h), vote(2, h)]);
        assert_eq!(storage.state(), StorageState::Committed(expected));
    }

    #[test]
    fn duplicate_vote_changes_nothing() {
        let mut storage = storage(4);
        let h = hash("h");
        assert_eq!(storage.insert(vote(0, h)), InsertOutcome::Inserted);
        assert_eq!(storage.insert(vote(0, h)), InsertOutcome::Duplicate);
        assert_eq!(storage.vote_count(&h), 1);
        assert_eq!(storage.voter_count(), 1);
        assert_eq!(storage.votes().len(), 1);
        assert!(storage.equivocators().is_empty());
    }

    #[test]
    fn ignores_foreign_votes() {
        let mut storage = storage(4);
        assert_eq!(storage.insert(vote(7, hash("h"))), InsertOutcome::UnknownPeer);
        let other_round = VoteMessage::new(
            hash("h"),
            ROUND.next_reject(),
            key(0),
            Signature::from_bytes([0; Signature::LENGTH]),
        );
        assert_eq!(storage.insert(other_round), InsertOutcome::WrongRound);
        assert!(storage.votes().is_empty());
    }

    #[test]
    fn reject_proven_when_four_peers_vote_four_hashes() {
        let mut storage = storage(4);
        let hashes: Vec<_> = ["a", "b", "c", "d"].iter().map(|name| hash(name)).collect();
        for (peer, h) in hashes.iter().enumerate() {
            assert!(!storage.is_reject_proven());
            storage.insert(vote(peer as u8, *h));
        }
        // Best count 1, nobody left to vote: 1 + 0 < 3.
        assert!(storage.is_reject_proven());
        let expected = RejectMessage::new(
            hashes
                .iter()
                .enumerate()
                .map(|(peer, h)| vote(peer as u8, *h))
                .collect(),
        );
        assert_eq!(storage.state(), StorageState::Rejected(expected));
    }

    #[test]
    fn reject_proven_before_everybody_voted() {
        let mut storage = storage(7);
        // Supermajority is 5: after 2 votes for `a` and 2 for `b`, `a` can still get 5 votes.
        storage.insert(vote(0, hash("a")));
        storage.insert(vote(1, hash("a")));
        storage.insert(vote(2, hash("b")));
        storage.insert(vote(3, hash("b")));
        assert!(!storage.is_reject_proven());
        // Now the best hash has 2 votes and only 2 peers are left: 2 + 2 < 5.
        storage.insert(vote(4, hash("c")));
        assert!(storage.is_reject_proven());
        assert!(matches!(storage.state(), StorageState::Rejected(reject) if reject.votes().len() == 5));
    }

    #[test]
    fn equivocation_is_recorded_but_counted_once_per_hash() {
        let mut storage = storage(4);
        let (a, b) = (hash("a"), hash("b"));
        assert_eq!(storage.insert(vote(0, a)), InsertOutcome::Inserted);
        assert_eq!(storage.insert(vote(0, b)), InsertOutcome::Inserted);
        assert_eq!(storage.insert(vote(0, b)), InsertOutcome::Duplicate);
        assert_eq!(storage.vote_count(&a), 1);
        assert_eq!(storage.vote_count(&b), 1);
        assert_eq!(storage.voter_count(), 1);
        assert_eq!(storage.votes().len(), 2);
        assert!(storage.equivocators().contains(&key(0)));

        // The equivocator's extra vote doesn't stand in for a missing peer.
        storage.insert(vote(1, a));
        assert!(!storage.is_supermajority_reached(&a));
        storage.insert(vote(2, a));
        assert!(storage.is_supermajority_reached(&a));
        assert!(matches!(storage.state(), StorageState::Committed(commit) if commit.hash() == Some(a)));
    }

    #[test]
    fn first_seen_hash_wins_ties_in_commit_detection() {
        // With a single peer every vote is a supermajority; an equivocating sole peer commits
        // the hash it voted for first.
        let mut storage = storage(1);
        storage.insert(vote(0, hash("first")));
        storage.insert(vote(0, hash("second")));
        assert!(matches!(
            storage.state(),
            StorageState::Committed(commit) if commit.hash() == Some(hash("first"))
        ));
    }
}
