use thiserror::Error;

use crate::{crypto, crypto::PublicKey, types::Round};

/// Errors returned to callers of the engine and its service.
///
/// Problems with messages received from peers are never reported as errors; such messages are
/// logged and dropped.
#[derive(Debug, Error)]
pub enum Error {
    /// Signing the local vote failed; the round was not started.
    #[error("could not sign vote: {0}")]
    Crypto(#[from] crypto::Error),
    /// A cluster ordering needs at least one peer.
    #[error("cluster ordering has no peers")]
    EmptyOrdering,
    /// A cluster ordering listed the same peer twice.
    #[error("peer {0} appears more than once in the cluster ordering")]
    DuplicatePeer(PublicKey),
    /// A vote was requested while the engine is still voting in a round.
    #[error("already voting in round {0}")]
    AlreadyVoting(Round),
    /// The round counter can only move forward.
    #[error("cannot move from round {current} back to round {requested}")]
    RoundRegression { current: Round, requested: Round },
    /// The service task is no longer running.
    #[error("consensus service has stopped")]
    ServiceStopped,
}
