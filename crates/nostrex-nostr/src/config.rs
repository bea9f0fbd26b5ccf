//! Configuration for the relay session

use std::time::Duration;

use nostrex_core::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Relays the session connects to when nothing else is configured
pub const DEFAULT_SESSION_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.nostr.band",
    "wss://relay.snort.social",
];

/// Profile entries younger than this are served from memory
pub const DEFAULT_PROFILE_TTL: Duration = Duration::from_secs(5 * 60);

// ----------------------------------------------------------------------------
// Session Configuration
// ----------------------------------------------------------------------------

/// Timing and relay configuration for the session, profile cache and login flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Relay URLs the pool is built with
    pub relays: Vec<String>,
    /// Pause before the first signer poll
    pub warm_up: Duration,
    /// Signer presence polling
    pub detect_policy: RetryPolicy,
    /// Public key requests
    pub key_policy: RetryPolicy,
    /// Whole connect-to-pool step
    pub connect_policy: RetryPolicy,
    /// Wait after dialing relays before checking which ones came up
    pub settle_delay: Duration,
    /// Upper bound on a single relay query
    pub fetch_timeout: Duration,
    /// Profile staleness window
    pub profile_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            relays: DEFAULT_SESSION_RELAYS.iter().map(|r| r.to_string()).collect(),
            warm_up: Duration::from_millis(500),
            detect_policy: RetryPolicy::default(),
            key_policy: RetryPolicy::default(),
            connect_policy: RetryPolicy::default(),
            settle_delay: Duration::from_secs(2),
            fetch_timeout: Duration::from_secs(10),
            profile_ttl: DEFAULT_PROFILE_TTL,
        }
    }
}

impl SessionConfig {
    /// Replace the relay set, keeping the default when `relays` is empty
    pub fn with_relays<I, S>(mut self, relays: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let relays: Vec<String> = relays.into_iter().map(Into::into).collect();
        if !relays.is_empty() {
            self.relays = relays;
        }
        self
    }

    /// Configuration with no sleeps, for local relays and tests
    pub fn immediate() -> Self {
        let policy = RetryPolicy::fixed(3, Duration::ZERO);
        Self {
            warm_up: Duration::ZERO,
            detect_policy: policy.clone(),
            key_policy: policy.clone(),
            connect_policy: policy,
            settle_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}
