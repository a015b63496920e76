//! Per-host politeness cache
//!
//! Two maps keyed by host: what first contact with its robots.txt produced
//! (a stored document, or no usable document), and the delay resolved from
//! it. A host with a resolved delay is never contacted
//! again for its robots.txt during the run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Delay resolved for a host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    /// Wait this long after dispatching a request to the host
    Wait(Duration),

    /// The host must not be crawled
    Excluded,
}

impl Delay {
    /// Builds a delay from a (possibly fractional) number of seconds
    ///
    /// NaN and non-positive values give no wait. Values too large for a
    /// [`Duration`] saturate to [`Duration::MAX`].
    pub fn from_secs_f64(seconds: f64) -> Self {
        if seconds.is_nan() || seconds <= 0.0 {
            return Self::Wait(Duration::ZERO);
        }
        Self::Wait(Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX))
    }

    /// The wait duration, or `None` for an excluded host
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::Wait(d) => Some(*d),
            Self::Excluded => None,
        }
    }
}

/// What first contact with a host's robots.txt produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySource {
    /// The document was stored at this path
    Stored(PathBuf),

    /// The host answered with a non-auth error status
    Unrestricted,

    /// The host refused access or could not be reached
    Forbidden,
}

#[derive(Debug, Clone, Default)]
pub struct PolitenessCache {
    policies: HashMap<String, PolicySource>,
    delays: HashMap<String, Delay>,
}

impl PolitenessCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(&self, host: &str) -> Option<Delay> {
        self.delays.get(host).copied()
    }

    /// Stores the resolved delay for a host
    ///
    /// The first resolution wins; later ones are ignored so every caller
    /// converges on the same value.
    pub fn set_delay(&mut self, host: &str, delay: Delay) -> Delay {
        *self.delays.entry(host.to_string()).or_insert(delay)
    }

    pub fn policy_source(&self, host: &str) -> Option<&PolicySource> {
        self.policies.get(host)
    }

    pub fn set_policy_source(&mut self, host: &str, source: PolicySource) {
        self.policies.insert(host.to_string(), source);
    }

    /// Where the host's robots.txt was stored, if it was retrieved
    pub fn policy_path(&self, host: &str) -> Option<&Path> {
        match self.policies.get(host)? {
            PolicySource::Stored(path) => Some(path),
            PolicySource::Unrestricted | PolicySource::Forbidden => None,
        }
    }

    /// Number of hosts with a resolved delay
    pub fn resolved_hosts(&self) -> usize {
        self.delays.len()
    }
}
