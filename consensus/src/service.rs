//! Runs a `Yac` engine as a tokio task driven by a command mailbox.
//!
//! All inputs of the engine (local votes, messages from peers, timer expiries) are serialized
//! through one unbounded channel, so the engine itself never needs locking.

use std::fmt::{self, Display, Formatter};

use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender},
        oneshot,
    },
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{
    cluster_ordering::ClusterOrdering,
    config::Config,
    crypto::CryptoProvider,
    gate::GateObject,
    messages::YacMessage,
    network::YacNetwork,
    timer::{Timer, TokioTimer},
    types::{Round, YacHash},
    yac::Yac,
    Error,
};

/// Command sent to the consensus service.
#[derive(Debug)]
pub enum Event {
    /// Starts the current round with a vote for `hash`.
    Vote {
        hash: YacHash,
        ordering: ClusterOrdering,
        /// Response channel.
        responder: oneshot::Sender<Result<(), Error>>,
    },
    /// A message received from a peer.
    Message(YacMessage),
    /// The round timer for the given round expired.
    Timeout(Round),
    /// Moves the engine to a later round.
    AdvanceRound {
        round: Round,
        /// Response channel.
        responder: oneshot::Sender<Result<(), Error>>,
    },
    /// Requests a channel receiving all future outcomes.
    Subscribe {
        /// Response channel.
        responder: oneshot::Sender<UnboundedReceiver<GateObject>>,
    },
    /// Shuts down the service task.
    Shutdown,
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Event::Vote { hash, .. } => write!(f, "vote for {}", hash),
            Event::Message(message) => write!(f, "message: {}", message),
            Event::Timeout(round) => write!(f, "timeout of {}", round),
            Event::AdvanceRound { round, .. } => write!(f, "advance to {}", round),
            Event::Subscribe { .. } => write!(f, "subscribe"),
            Event::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Handle to a running consensus service. Cheap to clone.
#[derive(Clone, Debug)]
pub struct YacHandle {
    sender: UnboundedSender<Event>,
}

impl YacHandle {
    /// Creates a handle together with the mailbox it feeds.
    pub fn new_pair() -> (Self, UnboundedReceiver<Event>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (YacHandle { sender }, receiver)
    }

    /// Posts an event, dropping it if the service has stopped.
    pub fn send(&self, event: Event) {
        if let Err(mpsc::error::SendError(event)) = self.sender.send(event) {
            debug!(%event, "consensus service stopped; dropping event");
        }
    }

    /// Votes for `hash` in the current round and waits until the round has started.
    pub async fn vote(&self, hash: YacHash, ordering: ClusterOrdering) -> Result<(), Error> {
        let (responder, waiter) = oneshot::channel();
        self.sender
            .send(Event::Vote {
                hash,
                ordering,
                responder,
            })
            .map_err(|_| Error::ServiceStopped)?;
        waiter.await.map_err(|_| Error::ServiceStopped)?
    }

    /// Hands a message received from a peer to the engine.
    pub fn deliver(&self, message: YacMessage) {
        self.send(Event::Message(message));
    }

    pub async fn advance_round(&self, round: Round) -> Result<(), Error> {
        let (responder, waiter) = oneshot::channel();
        self.sender
            .send(Event::AdvanceRound { round, responder })
            .map_err(|_| Error::ServiceStopped)?;
        waiter.await.map_err(|_| Error::ServiceStopped)?
    }

    /// Returns a channel receiving every outcome concluded after this call.
    pub async fn subscribe(&self) -> Result<UnboundedReceiver<GateObject>, Error> {
        let (responder, waiter) = oneshot::channel();
        self.sender
            .send(Event::Subscribe { responder })
            .map_err(|_| Error::ServiceStopped)?;
        waiter.await.map_err(|_| Error::ServiceStopped)
    }

    pub fn shutdown(&self) {
        self.send(Event::Shutdown);
    }

    /// Returns a handle which does not keep the service running.
    pub fn downgrade(&self) -> WeakYacHandle {
        WeakYacHandle {
            sender: self.sender.downgrade(),
        }
    }
}

/// A `YacHandle` that does not keep the service alive.
///
/// Used by the parts of the system the service itself owns, such as its timer, and by transports
/// that must not outlive their nodes.
#[derive(Clone, Debug)]
pub struct WeakYacHandle {
    sender: WeakUnboundedSender<Event>,
}

impl WeakYacHandle {
    /// Posts an event, dropping it if every `YacHandle` is gone or the service has stopped.
    pub fn send(&self, event: Event) {
        match self.sender.upgrade() {
            Some(sender) => YacHandle { sender }.send(event),
            None => debug!(%event, "consensus service has no handles left; dropping event"),
        }
    }

    pub fn deliver(&self, message: YacMessage) {
        self.send(Event::Message(message));
    }
}

/// Starts a service for an engine using `network` and `crypto`, with a `TokioTimer`.
///
/// Must be called from within a tokio runtime. The service runs until `YacHandle::shutdown` is
/// called or every clone of the returned handle is dropped; the returned join handle resolves
/// afterwards.
pub fn spawn<N, C>(network: N, crypto: C, config: Config) -> (YacHandle, JoinHandle<()>)
where
    N: YacNetwork + Send + 'static,
    C: CryptoProvider + Send + 'static,
{
    let (handle, mailbox) = YacHandle::new_pair();
    let timer = TokioTimer::new(handle.downgrade());
    let yac = Yac::new(network, crypto, timer, config);
    let join_handle = tokio::spawn(run(yac, mailbox));
    (handle, join_handle)
}

/// Feeds events from `mailbox` to `yac` until a shutdown is requested or the mailbox closes.
pub async fn run<N, C, T>(mut yac: Yac<N, C, T>, mut mailbox: UnboundedReceiver<Event>)
where
    N: YacNetwork,
    C: CryptoProvider,
    T: Timer,
{
    while let Some(event) = mailbox.recv().await {
        match event {
            Event::Vote {
                hash,
                ordering,
                responder,
            } => {
                let result = yac.vote(hash, ordering);
                if responder.send(result).is_err() {
                    debug!("vote requester went away");
                }
            }
            Event::Message(message) => yac.on_message(message),
            Event::Timeout(round) => yac.on_timeout(round),
            Event::AdvanceRound { round, responder } => {
                let result = yac.advance_round(round);
                if responder.send(result).is_err() {
                    debug!("round advance requester went away");
                }
            }
            Event::Subscribe { responder } => {
                // A subscriber that went away is pruned on the next outcome.
                let _ = responder.send(yac.subscribe_channel());
            }
            Event::Shutdown => break,
        }
    }
    info!(current_round = %yac.current_round(), "consensus service stopped");
}
