//! Signing of local votes and verification of votes received from peers.

mod asymmetric_key;

use std::{io, path::PathBuf};

use ed25519_dalek::SignatureError;
use thiserror::Error;
use tracing::debug;

pub use asymmetric_key::{PublicKey, SecretKey, Signature};

use crate::{
    messages::{CommitMessage, RejectMessage, VoteMessage},
    types::{Round, YacHash},
};

/// Cryptographic errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A key or signature was malformed, or a signature did not verify.
    #[error("ed25519 error: {0}")]
    Ed25519(#[from] SignatureError),
    /// The operating system could not provide randomness for a new key.
    #[error("could not gather entropy for a new key: {0}")]
    Entropy(getrandom::Error),
    /// The payload to be signed could not be encoded.
    #[error("could not encode signing payload: {0}")]
    Encoding(#[from] bincode::Error),
    /// A key file did not contain valid hex.
    #[error("could not decode hex: {0}")]
    Hex(#[from] hex::FromHexError),
    /// A key file could not be read or written.
    #[error("could not access key file {}: {error}", path.display())]
    KeyFile { path: PathBuf, error: io::Error },
}

/// Signs votes with the local key and checks signatures on messages from peers.
///
/// Implementations must be stateless per call: the engine may verify the same message several
/// times, and verification must not distinguish between forged and malformed signatures.
pub trait CryptoProvider {
    /// The key identifying this node in a `ClusterOrdering`.
    fn public_key(&self) -> PublicKey;

    /// Creates a signed vote for `hash` in `round`.
    fn sign(&self, round: Round, hash: YacHash) -> Result<VoteMessage, Error>;

    /// Returns `true` if the vote carries a valid signature by its signer.
    fn verify_vote(&self, vote: &VoteMessage) -> bool;

    /// Returns `true` if every vote in the commit message verifies.
    fn verify_commit(&self, commit: &CommitMessage) -> bool {
        commit.votes().iter().all(|vote| self.verify_vote(vote))
    }

    /// Returns `true` if every vote in the reject message verifies.
    fn verify_reject(&self, reject: &RejectMessage) -> bool {
        reject.votes().iter().all(|vote| self.verify_vote(vote))
    }
}

/// A `CryptoProvider` holding an ed25519 key pair.
#[derive(Debug)]
pub struct Ed25519Crypto {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl Ed25519Crypto {
    pub fn new(secret_key: SecretKey) -> Self {
        let public_key = secret_key.public_key();
        Ed25519Crypto {
            secret_key,
            public_key,
        }
    }
}

impl CryptoProvider for Ed25519Crypto {
    fn public_key(&self) -> PublicKey {
        self.public_key
    }

    fn sign(&self, round: Round, hash: YacHash) -> Result<VoteMessage, Error> {
        let payload = VoteMessage::signing_digest(round, hash)?;
        let signature = self.secret_key.sign(payload);
        Ok(VoteMessage::new(hash, round, self.public_key, signature))
    }

    fn verify_vote(&self, vote: &VoteMessage) -> bool {
        let payload = match VoteMessage::signing_digest(vote.round(), *vote.hash()) {
            Ok(payload) => payload,
            Err(error) => {
                debug!(%error, "failed to encode vote payload");
                return false;
            }
        };
        if let Err(error) = vote.signer().verify(payload, vote.signature()) {
            debug!(%error, signer = %vote.signer(), round = %vote.round(), "invalid vote signature");
            return false;
        }
        true
    }
}
