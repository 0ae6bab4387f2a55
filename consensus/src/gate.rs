//! Round outcomes and their delivery to local subscribers.

use std::fmt::{self, Display, Formatter};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{
    messages::{CommitMessage, RejectMessage},
    types::Round,
};

/// The outcome of a round, as seen by the block-creation pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateObject {
    /// A supermajority agreed on a candidate.
    Commit(CommitMessage),
    /// It is proven, or assumed after a timeout, that no candidate can be agreed on.
    Reject(RejectMessage),
    /// A supermajority agreed that there is no candidate.
    AgreementOnNone { round: Round },
}

impl GateObject {
    /// Returns the round this outcome concludes.
    pub fn round(&self) -> Option<Round> {
        match self {
            GateObject::Commit(commit) => commit.round(),
            GateObject::Reject(reject) => reject.round(),
            GateObject::AgreementOnNone { round } => Some(*round),
        }
    }
}

impl Display for GateObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            GateObject::Commit(commit) => match commit.hash() {
                Some(hash) => write!(f, "commit of {} with {} votes", hash, commit.votes().len()),
                None => write!(f, "commit with {} votes", commit.votes().len()),
            },
            GateObject::Reject(reject) => write!(f, "reject with {} votes", reject.votes().len()),
            GateObject::AgreementOnNone { round } => write!(f, "agreement on none in {}", round),
        }
    }
}

enum Subscriber {
    Callback(Box<dyn FnMut(&GateObject) + Send>),
    Channel(UnboundedSender<GateObject>),
}

/// The subscribers to the outcome stream. Every subscriber sees every outcome, in order.
#[derive(Default)]
pub(crate) struct OutcomeSubscribers {
    subscribers: Vec<Subscriber>,
}

impl OutcomeSubscribers {
    pub(crate) fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&GateObject) + Send + 'static,
    {
        self.subscribers
            .push(Subscriber::Callback(Box::new(callback)));
    }

    pub(crate) fn subscribe_channel(&mut self) -> UnboundedReceiver<GateObject> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.push(Subscriber::Channel(sender));
        receiver
    }

    /// Delivers `outcome` to every subscriber, dropping channels whose receiver is gone.
    pub(crate) fn emit(&mut self, outcome: &GateObject) {
        self.subscribers.retain_mut(|subscriber| match subscriber {
            Subscriber::Callback(callback) => {
                callback(outcome);
                true
            }
            Subscriber::Channel(sender) => sender.send(outcome.clone()).is_ok(),
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }
}

impl fmt::Debug for OutcomeSubscribers {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeSubscribers")
            .field("count", &self.subscribers.len())
            .finish()
    }
}
