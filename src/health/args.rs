//! Argument keys and the argument map used to fill in warning text.
//!
//! The key space is a fixed, shared enumeration: each warnable's message
//! function documents, by usage, which keys it reads, and producers supply
//! those keys when marking the warnable unhealthy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named parameter a warning message may interpolate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgKey {
    /// Version of the agent currently running.
    CurrentVersion,
    /// Latest version available for install.
    AvailableVersion,
    /// Error text reported by the producer.
    ErrorText,
    /// Human-readable duration, e.g. "2m30s".
    Duration,
    /// Display name of a relay region.
    RelayRegionName,
    /// Numeric identifier of a relay region.
    RelayRegionId,
    /// Name of the remote server involved in a TLS failure.
    ServerName,
    /// Name of the internal receive function that stopped.
    FunctionName,
}

/// Arguments captured when a warnable becomes unhealthy.
///
/// Lookup of an absent key yields the empty string, so templated message
/// functions always render and never fail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Args(BTreeMap<ArgKey, String>);

impl Args {
    /// Create an empty argument map.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insertion.
    #[must_use]
    pub fn with(mut self, key: ArgKey, value: impl Into<String>) -> Self {
        self.0.insert(key, value.into());
        self
    }

    /// Insert or overwrite a value.
    pub fn insert(&mut self, key: ArgKey, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }

    /// Look up a key, falling back to the empty string when absent.
    pub fn get(&self, key: ArgKey) -> &str {
        self.0.get(&key).map_or("", String::as_str)
    }

    /// Whether any arguments were supplied.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of supplied arguments.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(ArgKey, String)> for Args {
    fn from_iter<I: IntoIterator<Item = (ArgKey, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
