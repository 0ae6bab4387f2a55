//! Test doubles and fixtures shared by the unit tests.

use std::sync::{Arc, Mutex};

use yac_hashing::Digest;

use crate::{
    cluster_ordering::{ClusterOrdering, Peer},
    crypto::{self, CryptoProvider, Ed25519Crypto, PublicKey, SecretKey},
    messages::{CommitMessage, RejectMessage, VoteMessage},
    network::YacNetwork,
    timer::Timer,
    types::{Round, TimeDiff, YacHash},
};

/// The deterministic secret key of the test node with the given index.
pub(crate) fn secret_key(index: usize) -> SecretKey {
    SecretKey::from_bytes([index as u8 + 1; SecretKey::LENGTH]).unwrap()
}

pub(crate) fn public_key(index: usize) -> PublicKey {
    secret_key(index).public_key()
}

pub(crate) fn crypto(index: usize) -> Ed25519Crypto {
    Ed25519Crypto::new(secret_key(index))
}

/// An ordering of the test nodes `0..peer_count`.
pub(crate) fn cluster(peer_count: usize) -> ClusterOrdering {
    let peers = (0..peer_count)
        .map(|index| Peer::new(format!("node-{}", index), public_key(index)))
        .collect();
    ClusterOrdering::create(peers).unwrap()
}

/// A vote signed by the test node with the given index.
pub(crate) fn sign_vote(index: usize, round: Round, hash: YacHash) -> VoteMessage {
    crypto(index).sign(round, hash).unwrap()
}

pub(crate) fn test_hash(name: &str) -> YacHash {
    YacHash::new(Digest::hash(name), Digest::hash(format!("block of {}", name)))
}

/// A message captured by the `RecordingNetwork`, with its recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Sent {
    Vote(PublicKey, VoteMessage),
    Commit(PublicKey, CommitMessage),
    Reject(PublicKey, RejectMessage),
}

/// A network recording everything sent through it. Clones share the record.
#[derive(Clone, Debug, Default)]
pub(crate) struct RecordingNetwork {
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl RecordingNetwork {
    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn votes(&self) -> Vec<(PublicKey, VoteMessage)> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Vote(to, vote) => Some((to, vote)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn commits(&self) -> Vec<(PublicKey, CommitMessage)> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Commit(to, commit) => Some((to, commit)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn rejects(&self) -> Vec<(PublicKey, RejectMessage)> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Reject(to, reject) => Some((to, reject)),
                _ => None,
            })
            .collect()
    }
}

impl YacNetwork for RecordingNetwork {
    fn send_vote(&self, to: &Peer, vote: VoteMessage) {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Vote(*to.public_key(), vote));
    }

    fn send_commit(&self, to: &Peer, commit: CommitMessage) {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Commit(*to.public_key(), commit));
    }

    fn send_reject(&self, to: &Peer, reject: RejectMessage) {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Reject(*to.public_key(), reject));
    }
}

#[derive(Debug, Default)]
pub(crate) struct TimerLog {
    pub(crate) starts: Vec<(Round, TimeDiff)>,
    pub(crate) denies: usize,
    /// The round the timer is currently armed for.
    pub(crate) armed: Option<Round>,
}

/// A timer that never fires on its own; tests call `on_timeout` directly.
#[derive(Clone, Debug, Default)]
pub(crate) struct RecordingTimer {
    log: Arc<Mutex<TimerLog>>,
}

impl RecordingTimer {
    pub(crate) fn starts(&self) -> Vec<(Round, TimeDiff)> {
        self.log.lock().unwrap().starts.clone()
    }

    pub(crate) fn denies(&self) -> usize {
        self.log.lock().unwrap().denies
    }

    pub(crate) fn armed(&self) -> Option<Round> {
        self.log.lock().unwrap().armed
    }
}

impl Timer for RecordingTimer {
    fn start(&mut self, round: Round, timeout: TimeDiff) {
        let mut log = self.log.lock().unwrap();
        log.starts.push((round, timeout));
        log.armed = Some(round);
    }

    fn deny(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.denies += 1;
        log.armed = None;
    }
}

/// A crypto provider that verifies like `Ed25519Crypto` but cannot sign.
#[derive(Debug)]
pub(crate) struct FailingCrypto(pub(crate) Ed25519Crypto);

impl CryptoProvider for FailingCrypto {
    fn public_key(&self) -> PublicKey {
        self.0.public_key()
    }

    fn sign(&self, _round: Round, _hash: YacHash) -> Result<VoteMessage, crypto::Error> {
        Err(crypto::Error::Ed25519(ed25519_dalek::SignatureError::new()))
    }

    fn verify_vote(&self, vote: &VoteMessage) -> bool {
        self.0.verify_vote(vote)
    }
}
