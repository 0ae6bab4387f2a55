//! # Yet Another Consensus
//!
//! A Byzantine-fault-tolerant voting engine. In every round, each peer of a fixed
//! [`ClusterOrdering`] votes for one [`YacHash`]; the round is committed once more than two
//! thirds of the peers voted for the same hash, and rejected once that has become impossible or
//! the round timed out. Outcomes are reported as [`GateObject`]s.
//!
//! ## Structure
//!
//! The state machine lives in [`Yac`]. It is driven by calls to its methods and talks to the
//! outside world through three seams: [`YacNetwork`] to send messages to peers, [`CryptoProvider`]
//! to sign and verify votes and [`Timer`] for round deadlines. [`service::spawn`] runs an engine as
//! a tokio task behind a [`YacHandle`], with a [`TokioTimer`].

#![warn(trivial_casts, trivial_numeric_casts, unused_qualifications)]

pub mod cluster_ordering;
pub mod config;
pub mod crypto;
mod error;
pub mod gate;
pub mod logging;
pub mod messages;
pub mod network;
pub mod service;
#[cfg(test)]
pub(crate) mod testing;
pub mod timer;
pub mod types;
pub mod vote_storage;
pub mod yac;

pub use cluster_ordering::{ClusterOrdering, Peer};
pub use config::{Config, TimeoutPolicy};
pub use crypto::{CryptoProvider, Ed25519Crypto, PublicKey, SecretKey, Signature};
pub use error::Error;
pub use gate::GateObject;
pub use messages::{CommitMessage, RejectMessage, VoteMessage, YacMessage};
pub use network::{InMemoryNetwork, YacNetwork};
pub use service::{Event, WeakYacHandle, YacHandle};
pub use timer::{Timer, TokioTimer};
pub use types::{Round, TimeDiff, YacHash};
pub use yac::{Phase, Yac};
