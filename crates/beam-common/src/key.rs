use serde::{Deserialize, Serialize};
use std::fmt;

use crate::frame::SEPARATOR;

/// Identity a receiver supplies when it connects to the relay.
///
/// Keys are opaque; the only structural rule is that a key must be
/// routable inside a `|`-separated frame.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiverKey(String);

impl ReceiverKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Validate a key taken from an untrusted source (a URL path segment).
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || raw.contains(SEPARATOR) || raw.contains('/') {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ReceiverKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}
