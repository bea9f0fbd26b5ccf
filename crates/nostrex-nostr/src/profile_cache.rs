//! Per-identity profile cache
//!
//! Entries are keyed by canonical hex key and replaced wholesale on every
//! successful fetch. A failed refresh never touches an existing entry, so
//! stale data stays usable. Fetches are single-flight per identity: callers
//! that arrive while a fetch is outstanding await the same result. Fetches
//! run as spawned tasks, so a caller that stops waiting does not cancel them.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use hashbrown::HashMap;
use nostrex_core::{Identity, PublicKeyHex, TimeSource, Timestamp};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::client::UserHandle;
use crate::error::ProfileError;
use crate::metadata::ProfileSnapshot;
use crate::session::SessionManager;

type ProfileResult = Result<ProfileSnapshot, ProfileError>;
type InFlightFetch = Shared<BoxFuture<'static, ProfileResult>>;

/// One cached profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileCacheEntry {
    pub identity: Identity,
    pub profile: ProfileSnapshot,
    pub fetched_at: Timestamp,
}

#[derive(Default)]
struct CacheState {
    entries: RwLock<HashMap<PublicKeyHex, ProfileCacheEntry>>,
    in_flight: Mutex<HashMap<PublicKeyHex, InFlightFetch>>,
    last_error: RwLock<Option<ProfileError>>,
}

pub struct ProfileCache {
    session: Arc<SessionManager>,
    time_source: Arc<dyn TimeSource>,
    ttl: Duration,
    state: Arc<CacheState>,
}

impl ProfileCache {
    pub fn new(session: Arc<SessionManager>, time_source: Arc<dyn TimeSource>) -> Self {
        let ttl = session.config().profile_ttl;
        Self {
            session,
            time_source,
            ttl,
            state: Arc::new(CacheState::default()),
        }
    }

    /// Fetch a profile, `None` on any failure
    ///
    /// The failure reason is available from [`last_error`](Self::last_error).
    pub async fn fetch_profile(&self, identity: &str, force: bool) -> Option<ProfileSnapshot> {
        self.try_fetch_profile(identity, force).await.ok()
    }

    /// Fetch a profile, reporting why it failed
    pub async fn try_fetch_profile(&self, identity: &str, force: bool) -> ProfileResult {
        let result = match Identity::parse(identity) {
            Ok(identity) => self.resolve(identity, force).await,
            Err(e) => Err(ProfileError::InvalidIdentity(e)),
        };

        let mut last_error = self.state.last_error.write().await;
        match &result {
            Ok(_) => *last_error = None,
            Err(e) => {
                warn!("Profile lookup failed: {}", e);
                *last_error = Some(e.clone());
            }
        }
        result
    }

    async fn resolve(&self, identity: Identity, force: bool) -> ProfileResult {
        if !force {
            if let Some(entry) = self.fresh_entry(identity.raw()).await {
                debug!("Profile cache hit for {}", identity.raw().short());
                return Ok(entry.profile);
            }
        }

        let fetch = {
            let mut in_flight = self.state.in_flight.lock().await;
            match in_flight.get(identity.raw()) {
                Some(fetch) => {
                    debug!("Joining in-flight fetch for {}", identity.raw().short());
                    fetch.clone()
                }
                None => {
                    let fetch = self.spawn_fetch(identity.clone());
                    in_flight.insert(identity.raw().clone(), fetch.clone());
                    fetch
                }
            }
        };

        fetch.await
    }

    /// Start the network fetch as its own task
    ///
    /// Must be called with the in-flight map locked; the task removes its own
    /// entry, which therefore happens after insertion.
    fn spawn_fetch(&self, identity: Identity) -> InFlightFetch {
        let session = self.session.clone();
        let state = self.state.clone();
        let time_source = self.time_source.clone();

        let task = tokio::spawn(async move {
            let result = fetch_from_network(&session, &identity).await;

            if let Ok(profile) = &result {
                let entry = ProfileCacheEntry {
                    identity: identity.clone(),
                    profile: profile.clone(),
                    fetched_at: time_source.now(),
                };
                state
                    .entries
                    .write()
                    .await
                    .insert(identity.raw().clone(), entry);
            }

            state.in_flight.lock().await.remove(identity.raw());
            result
        });

        async move {
            task.await.unwrap_or_else(|e| {
                Err(ProfileError::FetchError(format!("fetch task failed: {}", e)))
            })
        }
        .boxed()
        .shared()
    }

    async fn fresh_entry(&self, key: &PublicKeyHex) -> Option<ProfileCacheEntry> {
        let entries = self.state.entries.read().await;
        let entry = entries.get(key)?;
        let age = self.time_source.now().duration_since(entry.fetched_at);
        (age < self.ttl).then(|| entry.clone())
    }

    // ------------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------------

    /// Cached entry regardless of age
    pub async fn cached(&self, identity: &str) -> Option<ProfileCacheEntry> {
        let key = nostrex_core::normalize(identity);
        if key.is_empty() {
            return None;
        }
        self.state.entries.read().await.get(&key).cloned()
    }

    /// Drop the cached entry for `identity`
    pub async fn invalidate(&self, identity: &str) {
        let key = nostrex_core::normalize(identity);
        if self.state.entries.write().await.remove(&key).is_some() {
            debug!("Invalidated profile for {}", key.short());
        }
    }

    pub async fn last_error(&self) -> Option<ProfileError> {
        self.state.last_error.read().await.clone()
    }

    /// Whether any fetch is outstanding
    pub async fn is_loading(&self) -> bool {
        !self.state.in_flight.lock().await.is_empty()
    }
}

async fn fetch_from_network(session: &SessionManager, identity: &Identity) -> ProfileResult {
    let client = session
        .read_client()
        .await
        .map_err(|e| ProfileError::FetchError(e.to_string()))?;

    let user = UserHandle::new(identity.clone(), client);
    match user.fetch_profile().await {
        Ok(Some(profile)) => {
            info!("Fetched profile for {}", identity.raw().short());
            Ok(profile)
        }
        Ok(None) => Err(ProfileError::ProfileNotFound {
            identity: identity.display().to_string(),
        }),
        Err(e) => Err(ProfileError::FetchError(e.to_string())),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
