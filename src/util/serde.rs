//! Shared identifier types that cross the serialization boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque job identifier, stable for the job's lifetime.
pub type JobId = String;

/// Opaque identity of the user owning a job.
pub type OwnerId = String;

/// Milliseconds since the Unix epoch.
pub type TimestampMs = u128;

/// Resource identifier: the host URL plus an integer discriminator.
///
/// Rendered and parsed as `host.index`, e.g. `grid.example.org.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    /// Host URL or fully qualified name of the resource front-end.
    pub host: String,
    /// Discriminator for several resources behind one host.
    pub index: u32,
}

impl ResourceId {
    /// Build an identifier from its parts.
    pub fn new(host: impl Into<String>, index: u32) -> Self {
        Self {
            host: host.into(),
            index,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.host, self.index)
    }
}

impl FromStr for ResourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, index) = s
            .rsplit_once('.')
            .ok_or_else(|| format!("resource id `{s}` lacks a `.index` suffix"))?;
        if host.is_empty() {
            return Err(format!("resource id `{s}` has an empty host"));
        }
        let index = index
            .parse::<u32>()
            .map_err(|e| format!("resource id `{s}` has a bad index: {e}"))?;
        Ok(Self::new(host, index))
    }
}
