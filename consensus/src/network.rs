//! The transport seam: how the engine reaches its peers.

mod in_memory;

pub use in_memory::InMemoryNetwork;

use crate::{
    cluster_ordering::Peer,
    messages::{CommitMessage, RejectMessage, VoteMessage},
};

/// Sends consensus messages to peers.
///
/// Sending is fire-and-forget: the engine never waits for delivery, and retries or backpressure
/// are up to the implementation. Incoming messages are handed to the engine through its service
/// mailbox (see `YacHandle::deliver`).
pub trait YacNetwork {
    fn send_vote(&self, to: &Peer, vote: VoteMessage);

    fn send_commit(&self, to: &Peer, commit: CommitMessage);

    fn send_reject(&self, to: &Peer, reject: RejectMessage);
}
