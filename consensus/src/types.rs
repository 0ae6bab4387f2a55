//! Common types used across the consensus engine.

mod round;
mod time_diff;
mod yac_hash;

pub use round::Round;
pub use time_diff::{ParseTimeDiffError, TimeDiff};
pub use yac_hash::YacHash;
