use std::{
    fmt::{self, Display, Formatter},
    num::TryFromIntError,
    str::FromStr,
    time::Duration,
};

use humantime::DurationError;
use serde::{de::Error as SerdeError, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error parsing a `TimeDiff`.
#[derive(Debug, Error)]
pub enum ParseTimeDiffError {
    /// The string is not a valid `humantime` duration.
    #[error(transparent)]
    Duration(#[from] DurationError),
    /// The duration does not fit into a `u64` number of milliseconds.
    #[error("duration is too long: {0}")]
    Overflow(#[from] TryFromIntError),
}

/// A duration with millisecond precision.
///
/// Human-readable formats (TOML, JSON) use `humantime` strings such as `"3s"` or `"1min 30s"`;
/// binary formats use the number of milliseconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeDiff(u64);

impl TimeDiff {
    /// Returns the time difference as the number of milliseconds.
    pub fn millis(&self) -> u64 {
        self.0
    }

    /// Creates a new time difference from seconds.
    pub const fn from_seconds(seconds: u32) -> Self {
        TimeDiff(seconds as u64 * 1_000)
    }

    /// Creates a new time difference from milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        TimeDiff(millis)
    }
}

impl Display for TimeDiff {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", humantime::format_duration(Duration::from(*self)))
    }
}

impl FromStr for TimeDiff {
    type Err = ParseTimeDiffError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(TimeDiff::try_from(humantime::parse_duration(value)?)?)
    }
}

impl From<TimeDiff> for Duration {
    fn from(diff: TimeDiff) -> Duration {
        Duration::from_millis(diff.0)
    }
}

impl TryFrom<Duration> for TimeDiff {
    type Error = TryFromIntError;

    /// Converts a duration, truncated to whole milliseconds. Fails if it doesn't fit into `u64`.
    fn try_from(duration: Duration) -> Result<Self, Self::Error> {
        u64::try_from(duration.as_millis()).map(TimeDiff)
    }
}

impl Serialize for TimeDiff {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            self.to_string().serialize(serializer)
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for TimeDiff {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let value_as_string = String::deserialize(deserializer)?;
            TimeDiff::from_str(&value_as_string).map_err(SerdeError::custom)
        } else {
            let inner = u64::deserialize(deserializer)?;
            Ok(TimeDiff(inner))
        }
    }
}
