//! The voting state machine.
//!
//! In every round each node proposes one `YacHash`: it signs a vote for it, sends the vote to every
//! peer of the round's `ClusterOrdering` (itself included) and collects the peers' votes. A round
//! concludes as soon as one of these happens:
//!
//! * a supermajority of the peers voted for the same hash: the round is _committed_,
//! * so many peers voted for different hashes that no hash can reach a supermajority anymore: the
//!   round is _rejected_,
//! * a peer sent a commit or reject message proving one of the above,
//! * the round timer expired: the round is rejected, possibly after some extensions (see
//!   `TimeoutPolicy`).
//!
//! On conclusion the proof is first sent to every peer, so that the peers that are behind can
//! conclude too, and only then reported to the local subscribers. A commit on the empty hash is
//! reported as `GateObject::AgreementOnNone`.
//!
//! After a commit the next round is `(block_round + 1, 0)`, otherwise `(block_round,
//! reject_round + 1)`. The node doesn't take part in the next round until `vote` is called again;
//! messages for it that arrive in the meantime are kept and replayed when it starts.


use std::{collections::BTreeMap, mem};

use datasize::DataSize;
use tracing::{debug, info, warn};

use crate::{
    cluster_ordering::ClusterOrdering,
    config::{Config, TimeoutPolicy},
    crypto::CryptoProvider,
    gate::{GateObject, OutcomeSubscribers},
    messages::{CommitMessage, RejectMessage, VoteMessage, YacMessage},
    network::YacNetwork,
    timer::Timer,
    types::{Round, YacHash},
    vote_storage::{InsertOutcome, StorageState, VoteStorage},
    Error,
};

/// What the engine is doing, as seen from the outside.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the first `vote`.
    Idle,
    /// Collecting votes in the given round.
    Voting(Round),
    /// The given round has concluded; waiting for `vote` in the next one.
    Concluded(Round),
}

#[derive(Debug, DataSize)]
struct ActiveRound {
    own_vote: VoteMessage,
    storage: VoteStorage,
    /// How many times the timer has been re-armed under `TimeoutPolicy::Extend`.
    extensions: u32,
}

#[derive(Debug)]
enum YacState {
    Idle,
    Voting(Box<ActiveRound>),
    Concluded(Round),
}

enum Conclusion {
    Commit(CommitMessage),
    Reject(RejectMessage),
}

/// Where an incoming message goes.
enum Route {
    Process,
    Buffer(Round),
    Stale,
    TooFarAhead(Round),
    Malformed,
}

/// The YAC consensus engine for a single node.
///
/// The engine is not thread-safe: all calls, including timer expiries, must be serialized. Use
/// `service::spawn` to run it as a task driven by a mailbox.
#[derive(Debug)]
pub struct Yac<N, C, T> {
    network: N,
    crypto: C,
    timer: T,
    config: Config,
    state: YacState,
    /// The round the node is voting in, or the next one it will vote in.
    current_round: Round,
    /// Verified messages for rounds that haven't started locally yet, at most one commit or
    /// reject ahead of `current_round`.
    pending: BTreeMap<Round, Vec<YacMessage>>,
    pending_count: usize,
    subscribers: OutcomeSubscribers,
}

impl<N, C, T> Yac<N, C, T>
where
    N: YacNetwork,
    C: CryptoProvider,
    T: Timer,
{
    /// Creates an idle engine that will vote in round `(0, 0)` first.
    pub fn new(network: N, crypto: C, timer: T, config: Config) -> Self {
        Yac {
            network,
            crypto,
            timer,
            config,
            state: YacState::Idle,
            current_round: Round::default(),
            pending: BTreeMap::new(),
            pending_count: 0,
            subscribers: OutcomeSubscribers::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The round the node is voting in, or will vote in next.
    pub fn current_round(&self) -> Round {
        self.current_round
    }

    pub fn phase(&self) -> Phase {
        match &self.state {
            YacState::Idle => Phase::Idle,
            YacState::Voting(active) => Phase::Voting(active.storage.round()),
            YacState::Concluded(round) => Phase::Concluded(*round),
        }
    }

    pub fn is_voting(&self) -> bool {
        matches!(self.state, YacState::Voting(_))
    }

    /// Estimates the heap memory held by the active round and the kept messages, in bytes.
    pub fn estimate_heap_size(&self) -> usize {
        let active = match &self.state {
            YacState::Voting(active) => active.estimate_heap_size(),
            YacState::Idle | YacState::Concluded(_) => 0,
        };
        active + self.pending.estimate_heap_size()
    }

    /// Registers a callback invoked with every outcome, after the outcome was sent to the peers.
    ///
    /// The callback runs inside the engine and must not block.
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&GateObject) + Send + 'static,
    {
        self.subscribers.subscribe(callback);
    }

    /// Returns a channel receiving every outcome from now on.
    pub fn subscribe_channel(&mut self) -> tokio::sync::mpsc::UnboundedReceiver<GateObject> {
        self.subscribers.subscribe_channel()
    }

    /// Starts the current round by voting for `hash` among the peers in `ordering`.
    ///
    /// Fails if the node is already voting, or if the vote cannot be signed; in both cases nothing
    /// is sent and the state is unchanged.
    pub fn vote(&mut self, hash: YacHash, ordering: ClusterOrdering) -> Result<(), Error> {
        if let YacState::Voting(active) = &self.state {
            return Err(Error::AlreadyVoting(active.storage.round()));
        }
        let round = self.current_round;
        let own_vote = self.crypto.sign(round, hash)?;
        info!(
            %round,
            %hash,
            peers = ordering.peer_count(),
            "starting round"
        );

        let mut storage = VoteStorage::new(round, ordering);
        if storage.insert(own_vote.clone()) != InsertOutcome::Inserted {
            warn!(%round, "our key is not in the cluster ordering; our vote won't count");
        }
        for peer in storage.ordering().peers() {
            self.network.send_vote(peer, own_vote.clone());
        }
        self.timer.start(round, self.config.round_timeout);
        self.state = YacState::Voting(Box::new(ActiveRound {
            own_vote,
            storage,
            extensions: 0,
        }));

        // With a single peer, our own vote is a supermajority.
        self.check_termination();
        self.replay_pending(round);
        Ok(())
    }

    /// Handles any message received from a peer.
    pub fn on_message(&mut self, message: YacMessage) {
        match self.route(message.round()) {
            Route::Process => match message {
                YacMessage::Vote(vote) => self.apply_vote(vote),
                YacMessage::Commit(commit) => self.apply_commit(commit),
                YacMessage::Reject(reject) => self.apply_reject(reject),
            },
            Route::Buffer(round) => {
                if self.verify(&message) {
                    self.buffer(round, message);
                } else {
                    warn!(%message, "dropping message with invalid signatures");
                }
            }
            Route::Stale => {
                debug!(current_round = %self.current_round, %message, "dropping stale message")
            }
            Route::TooFarAhead(round) => debug!(
                current_round = %self.current_round,
                %round,
                "dropping message for a round too far ahead"
            ),
            Route::Malformed => warn!(%message, "dropping message without a common round"),
        }
    }

    pub fn on_vote(&mut self, vote: VoteMessage) {
        self.on_message(vote.into());
    }

    pub fn on_commit(&mut self, commit: CommitMessage) {
        self.on_message(commit.into());
    }

    pub fn on_reject(&mut self, reject: RejectMessage) {
        self.on_message(reject.into());
    }

    /// Handles the expiry of the timer started for `round`. Expiries of rounds that are no longer
    /// being voted in are ignored.
    pub fn on_timeout(&mut self, round: Round) {
        let active = match &mut self.state {
            YacState::Voting(active) if active.storage.round() == round => active,
            _ => {
                debug!(%round, "ignoring timeout of inactive round");
                return;
            }
        };

        let conclusion = match self.config.timeout_policy {
            TimeoutPolicy::Extend { max_extensions }
                if active.extensions < max_extensions && !active.storage.is_reject_proven() =>
            {
                active.extensions += 1;
                warn!(
                    %round,
                    extension = active.extensions,
                    voters = active.storage.voter_count(),
                    "no agreement before timeout; resending our vote"
                );
                for peer in active.storage.ordering().peers() {
                    self.network.send_vote(peer, active.own_vote.clone());
                }
                self.timer.start(round, self.config.round_timeout);
                None
            }
            _ => {
                warn!(
                    %round,
                    voters = active.storage.voter_count(),
                    "no agreement before timeout; rejecting round"
                );
                Some(Conclusion::Reject(RejectMessage::new(
                    active.storage.votes().to_vec(),
                )))
            }
        };
        if let Some(conclusion) = conclusion {
            self.conclude(conclusion);
        }
    }

    /// Moves the node to `round`, e.g. after it caught up with the chain by other means.
    ///
    /// A round being voted in is abandoned without an outcome. Kept messages for earlier rounds
    /// are discarded. Moving to an earlier round is an error; moving to the current one does
    /// nothing.
    pub fn advance_round(&mut self, round: Round) -> Result<(), Error> {
        if round < self.current_round {
            return Err(Error::RoundRegression {
                current: self.current_round,
                requested: round,
            });
        }
        if round == self.current_round {
            return Ok(());
        }
        if let YacState::Voting(active) = &self.state {
            info!(abandoned = %active.storage.round(), %round, "abandoning round");
            self.timer.deny();
        }
        self.state = YacState::Idle;
        self.current_round = round;
        self.discard_pending_before(round);
        Ok(())
    }

    fn route(&self, round: Option<Round>) -> Route {
        let round = match round {
            Some(round) => round,
            None => return Route::Malformed,
        };
        let current = self.current_round;
        if round < current {
            Route::Stale
        } else if round == current && self.is_voting() {
            Route::Process
        } else if round == current || round == current.next_reject() || round == current.next_block()
        {
            Route::Buffer(round)
        } else {
            Route::TooFarAhead(round)
        }
    }

    fn verify(&self, message: &YacMessage) -> bool {
        match message {
            YacMessage::Vote(vote) => self.crypto.verify_vote(vote),
            YacMessage::Commit(commit) => self.crypto.verify_commit(commit),
            YacMessage::Reject(reject) => self.crypto.verify_reject(reject),
        }
    }

    fn apply_vote(&mut self, vote: VoteMessage) {
        if !self.crypto.verify_vote(&vote) {
            warn!(%vote, "dropping vote with invalid signature");
            return;
        }
        let active = match &mut self.state {
            YacState::Voting(active) => active,
            _ => return,
        };
        let signer = *vote.signer();
        match active.storage.insert(vote) {
            InsertOutcome::Inserted => self.check_termination(),
            InsertOutcome::Duplicate => debug!(%signer, "ignoring duplicate vote"),
            InsertOutcome::UnknownPeer => debug!(%signer, "dropping vote from unknown peer"),
            InsertOutcome::WrongRound => debug!(%signer, "dropping vote for another round"),
        }
    }

    fn apply_commit(&mut self, commit: CommitMessage) {
        if !self.crypto.verify_commit(&commit) {
            warn!(votes = commit.votes().len(), "dropping commit with invalid signatures");
            return;
        }
        if commit.hash().is_none() {
            warn!(votes = commit.votes().len(), "dropping commit mixing hashes");
            return;
        }
        match self.proven_state(commit.votes()) {
            Some(StorageState::Committed(proof)) => self.conclude(Conclusion::Commit(proof)),
            _ => warn!(
                votes = commit.votes().len(),
                "dropping commit without a supermajority"
            ),
        }
    }

    fn apply_reject(&mut self, reject: RejectMessage) {
        if !self.crypto.verify_reject(&reject) {
            warn!(votes = reject.votes().len(), "dropping reject with invalid signatures");
            return;
        }
        match self.proven_state(reject.votes()) {
            Some(StorageState::Committed(proof)) => {
                info!(
                    votes = reject.votes().len(),
                    "reject message contains a supermajority; committing"
                );
                self.conclude(Conclusion::Commit(proof))
            }
            Some(StorageState::Rejected(proof)) => self.conclude(Conclusion::Reject(proof)),
            _ => warn!(
                votes = reject.votes().len(),
                "dropping reject that doesn't prove a reject"
            ),
        }
    }

    /// Evaluates the given votes on their own, against the active round's ordering. Votes from
    /// unknown peers or other rounds don't count.
    fn proven_state(&self, votes: &[VoteMessage]) -> Option<StorageState> {
        let active = match &self.state {
            YacState::Voting(active) => active,
            _ => return None,
        };
        let mut scratch = VoteStorage::new(active.storage.round(), active.storage.ordering().clone());
        for vote in votes {
            scratch.insert(vote.clone());
        }
        Some(scratch.state())
    }

    fn check_termination(&mut self) {
        let state = match &self.state {
            YacState::Voting(active) => active.storage.state(),
            _ => return,
        };
        match state {
            StorageState::Pending => {}
            StorageState::Committed(commit) => self.conclude(Conclusion::Commit(commit)),
            StorageState::Rejected(reject) => self.conclude(Conclusion::Reject(reject)),
        }
    }

    fn conclude(&mut self, conclusion: Conclusion) {
        let active = match mem::replace(&mut self.state, YacState::Idle) {
            YacState::Voting(active) => active,
            other => {
                self.state = other;
                return;
            }
        };
        let round = active.storage.round();
        let peers = active.storage.ordering().peers();

        let (outcome, next_round) = match conclusion {
            Conclusion::Commit(commit) => {
                for peer in peers {
                    self.network.send_commit(peer, commit.clone());
                }
                match commit.hash() {
                    Some(hash) if hash.is_empty() => {
                        (GateObject::AgreementOnNone { round }, round.next_reject())
                    }
                    _ => (GateObject::Commit(commit), round.next_block()),
                }
            }
            Conclusion::Reject(reject) => {
                for peer in peers {
                    self.network.send_reject(peer, reject.clone());
                }
                (GateObject::Reject(reject), round.next_reject())
            }
        };

        self.timer.deny();
        self.state = YacState::Concluded(round);
        self.current_round = next_round;
        self.discard_pending_before(next_round);
        info!(
            %round,
            %outcome,
            %next_round,
            subscribers = self.subscribers.len(),
            "round concluded"
        );
        self.subscribers.emit(&outcome);
    }

    fn buffer(&mut self, round: Round, message: YacMessage) {
        if self.pending_count >= self.config.max_pending_messages {
            warn!(%round, %message, "too many messages for future rounds; dropping");
            return;
        }
        let kept = self.pending.entry(round).or_default();
        if kept.contains(&message) {
            debug!(%round, %message, "ignoring duplicate of kept message");
            return;
        }
        debug!(%round, %message, "keeping message until round starts");
        kept.push(message);
        self.pending_count += 1;
    }

    fn replay_pending(&mut self, round: Round) {
        self.discard_pending_before(round);
        if let Some(messages) = self.pending.remove(&round) {
            self.pending_count -= messages.len();
            debug!(%round, count = messages.len(), "replaying kept messages");
            for message in messages {
                self.on_message(message);
            }
        }
    }

    fn discard_pending_before(&mut self, round: Round) {
        let kept = self.pending.split_off(&round);
        let discarded: usize = self.pending.values().map(Vec::len).sum();
        if discarded > 0 {
            debug!(%round, discarded, "discarding messages for skipped rounds");
        }
        self.pending = kept;
        self.pending_count -= discarded;
    }
}
