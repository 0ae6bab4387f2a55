//! Very fast networking used for testing and simulations.
//!
//! The `InMemoryNetwork` represents a full virtual network with flawless connectivity and
//! delivery: every message sent to a registered node is put straight into that node's service
//! mailbox. Removing a node simulates it going offline; messages to it are dropped. The network
//! only holds weak handles, so a node whose handles are all dropped stops as if removed.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use tracing::debug;

use super::YacNetwork;
use crate::{
    cluster_ordering::Peer,
    crypto::PublicKey,
    messages::{CommitMessage, RejectMessage, VoteMessage, YacMessage},
    service::{WeakYacHandle, YacHandle},
};

/// A shared in-process network. Clones refer to the same set of nodes.
#[derive(Clone, Debug, Default)]
pub struct InMemoryNetwork {
    nodes: Arc<RwLock<HashMap<PublicKey, WeakYacHandle>>>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the node with the given key reachable.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    pub fn register(&self, public_key: PublicKey, handle: &YacHandle) {
        self.nodes
            .write()
            .expect("poisoned lock")
            .insert(public_key, handle.downgrade());
    }

    /// Makes the node unreachable. Returns `false` if it wasn't registered.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    pub fn remove_node(&self, public_key: &PublicKey) -> bool {
        self.nodes
            .write()
            .expect("poisoned lock")
            .remove(public_key)
            .is_some()
    }

    fn deliver(&self, to: &Peer, message: YacMessage) {
        let nodes = self.nodes.read().expect("poisoned lock");
        match nodes.get(to.public_key()) {
            Some(handle) => handle.deliver(message),
            None => debug!(peer = %to, %message, "peer not connected; dropping message"),
        }
    }
}

impl YacNetwork for InMemoryNetwork {
    fn send_vote(&self, to: &Peer, vote: VoteMessage) {
        self.deliver(to, vote.into());
    }

    fn send_commit(&self, to: &Peer, commit: CommitMessage) {
        self.deliver(to, commit.into());
    }

    fn send_reject(&self, to: &Peer, reject: RejectMessage) {
        self.deliver(to, reject.into());
    }
}
