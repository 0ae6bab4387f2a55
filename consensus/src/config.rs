use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::TimeDiff;

/// What the engine does when a round's timer expires before agreement or proven reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Conclude the round with a reject built from the votes collected so far.
    ForceReject,
    /// Re-send the local vote and wait another `round_timeout`, at most `max_extensions` times,
    /// then conclude with a reject.
    Extend { max_extensions: u32 },
}

/// Consensus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
// Disallow unknown fields to ensure config files contain valid keys.
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// How long to wait for agreement in a round before applying the `timeout_policy`.
    pub round_timeout: TimeDiff,
    pub timeout_policy: TimeoutPolicy,
    /// The maximum number of messages for rounds we haven't started yet that are kept until
    /// the round starts.
    pub max_pending_messages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            round_timeout: TimeDiff::from_seconds(3),
            timeout_policy: TimeoutPolicy::ForceReject,
            max_pending_messages: 1024,
        }
    }
}

/// Errors loading a configuration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not read config file {}: {error}", path.display())]
    Io { path: PathBuf, error: io::Error },
    #[error("could not parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Config {
    /// Parses a configuration from TOML. Missing fields take their default values.
    pub fn from_toml(toml: &str) -> Result<Self, Error> {
        Ok(toml::from_str(toml)?)
    }

    /// Reads and parses a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|error| Error::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::from_toml(&contents)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_config_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn parses_all_fields() {
        let config = Config::from_toml(
            r#"
            round_timeout = "1s 500ms"
            max_pending_messages = 16

            [timeout_policy]
            policy = "extend"
            max_extensions = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.round_timeout, TimeDiff::from_millis(1_500));
        assert_eq!(config.max_pending_messages, 16);
        assert_eq!(
            config.timeout_policy,
            TimeoutPolicy::Extend { max_extensions: 2 }
        );
    }

    #[test]
    fn rejects_unknown_fields_and_bad_durations() {
        assert!(matches!(
            Config::from_toml("round_timeot = \"1s\""),
            Err(Error::Toml(_))
        ));
        assert!(Config::from_toml("round_timeout = \"soon\"").is_err());
        assert!(Config::from_toml("[timeout_policy]\npolicy = \"retry\"").is_err());
    }

    #[test]
    fn reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timeout_policy]\npolicy = \"force_reject\"").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.timeout_policy, TimeoutPolicy::ForceReject);

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::from_file(dir.path().join("missing.toml")),
            Err(Error::Io { .. })
        ));
    }
}
