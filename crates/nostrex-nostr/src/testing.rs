//! In-memory fakes for signers and relay pools
//!
//! Compiled for this crate's tests and behind the `testing` feature for
//! downstream crates. Every fake records how it was used so tests can assert
//! on call counts.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hashbrown::HashMap;
use nostr_sdk::Keys;
use nostrex_core::Identity;

use crate::client::{NetworkClient, NetworkClientFactory};
use crate::error::{NetworkError, SignerError};
use crate::metadata::ProfileSnapshot;
use crate::signer::{EventDraft, SignedEvent, Signer, SignerProvider};

// ----------------------------------------------------------------------------
// Fake Signer
// ----------------------------------------------------------------------------

/// Signer with a scripted public key answer
#[derive(Debug)]
pub struct FakeSigner {
    public_key: Result<String, SignerError>,
    key_requests: AtomicU32,
    signed: AtomicU32,
}

impl FakeSigner {
    /// Answers with a freshly generated valid key
    pub fn valid() -> Self {
        Self::with_key(Keys::generate().public_key().to_hex())
    }

    /// Answers with `key` verbatim, valid or not
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            public_key: Ok(key.into()),
            key_requests: AtomicU32::new(0),
            signed: AtomicU32::new(0),
        }
    }

    /// Refuses every key request
    pub fn denying() -> Self {
        Self {
            public_key: Err(SignerError::PermissionDenied("user rejected".to_string())),
            key_requests: AtomicU32::new(0),
            signed: AtomicU32::new(0),
        }
    }

    pub fn key_requests(&self) -> u32 {
        self.key_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Signer for FakeSigner {
    fn name(&self) -> &str {
        "fake"
    }

    async fn get_public_key(&self) -> Result<String, SignerError> {
        self.key_requests.fetch_add(1, Ordering::SeqCst);
        self.public_key.clone()
    }

    async fn sign_event(&self, draft: EventDraft) -> Result<SignedEvent, SignerError> {
        let pubkey = self.public_key.clone()?;
        let n = self.signed.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SignedEvent {
            id: format!("{:064x}", n),
            pubkey,
            created_at: draft.created_at.unwrap_or_default(),
            kind: draft.kind,
            tags: draft.tags,
            content: draft.content,
            sig: "0".repeat(128),
        })
    }
}

// ----------------------------------------------------------------------------
// Scripted Provider
// ----------------------------------------------------------------------------

/// Provider that finds its signer only after a number of empty polls
pub struct ScriptedSignerProvider {
    signer: Option<Arc<dyn Signer>>,
    absent_polls: u32,
    polls: AtomicU32,
}

impl ScriptedSignerProvider {
    pub fn present<S: Signer + 'static>(signer: S) -> Self {
        Self::after_polls(0, signer)
    }

    pub fn shared(signer: Arc<dyn Signer>) -> Self {
        Self {
            signer: Some(signer),
            absent_polls: 0,
            polls: AtomicU32::new(0),
        }
    }

    pub fn after_polls<S: Signer + 'static>(absent_polls: u32, signer: S) -> Self {
        Self {
            signer: Some(Arc::new(signer)),
            absent_polls,
            polls: AtomicU32::new(0),
        }
    }

    pub fn absent() -> Self {
        Self {
            signer: None,
            absent_polls: 0,
            polls: AtomicU32::new(0),
        }
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignerProvider for ScriptedSignerProvider {
    async fn detect(&self) -> Option<Arc<dyn Signer>> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst);
        if poll < self.absent_polls {
            return None;
        }
        self.signer.clone()
    }
}

// ----------------------------------------------------------------------------
// Fake Network
// ----------------------------------------------------------------------------

#[derive(Default)]
struct NetworkState {
    builds: AtomicU32,
    connect_calls: AtomicU32,
    connect_failures: AtomicU32,
    connect_timeouts: AtomicU32,
    unsigned_builds: AtomicU32,
    disconnects: AtomicU32,
    profile_fetches: AtomicU32,
    fail_fetches: AtomicBool,
    fetch_delay: Mutex<Duration>,
    profiles: Mutex<HashMap<String, ProfileSnapshot>>,
    published: Mutex<Vec<SignedEvent>>,
}

/// Shared handle on a scripted relay network
#[derive(Clone, Default)]
pub struct FakeNetwork {
    state: Arc<NetworkState>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> FakeClientFactory {
        FakeClientFactory {
            state: self.state.clone(),
        }
    }

    /// Fail the next `count` pool connects
    pub fn fail_connects(&self, count: u32) {
        self.state.connect_failures.store(count, Ordering::SeqCst);
    }

    /// Let the next `count` pool connects find no relay within the settle delay
    pub fn time_out_connects(&self, count: u32) {
        self.state.connect_timeouts.store(count, Ordering::SeqCst);
    }

    /// Make every profile fetch fail (or succeed again)
    pub fn fail_fetches(&self, fail: bool) {
        self.state.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        if let Ok(mut current) = self.state.fetch_delay.lock() {
            *current = delay;
        }
    }

    /// Publish a profile for `raw_key`
    pub fn set_profile(&self, raw_key: &str, profile: ProfileSnapshot) {
        if let Ok(mut profiles) = self.state.profiles.lock() {
            profiles.insert(raw_key.to_string(), profile);
        }
    }

    pub fn builds(&self) -> u32 {
        self.state.builds.load(Ordering::SeqCst)
    }

    /// Clients built without a signer
    pub fn unsigned_builds(&self) -> u32 {
        self.state.unsigned_builds.load(Ordering::SeqCst)
    }

    pub fn connect_calls(&self) -> u32 {
        self.state.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> u32 {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    pub fn profile_fetches(&self) -> u32 {
        self.state.profile_fetches.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<SignedEvent> {
        self.state
            .published
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

/// Factory counting every client it builds
pub struct FakeClientFactory {
    state: Arc<NetworkState>,
}

impl NetworkClientFactory for FakeClientFactory {
    fn build(
        &self,
        relays: &[String],
        signer: Option<Arc<dyn Signer>>,
    ) -> Result<Arc<dyn NetworkClient>, NetworkError> {
        self.state.builds.fetch_add(1, Ordering::SeqCst);
        if signer.is_none() {
            self.state.unsigned_builds.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Arc::new(FakeClient {
            state: self.state.clone(),
            relays: relays.to_vec(),
            signer,
        }))
    }
}

struct FakeClient {
    state: Arc<NetworkState>,
    relays: Vec<String>,
    signer: Option<Arc<dyn Signer>>,
}

#[async_trait]
impl NetworkClient for FakeClient {
    fn relays(&self) -> Vec<String> {
        self.relays.clone()
    }

    async fn connect(&self) -> Result<Vec<String>, NetworkError> {
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.state.connect_timeouts) {
            return Err(NetworkError::Timeout);
        }
        if take_one(&self.state.connect_failures) {
            return Err(NetworkError::NoRelayConnected);
        }
        Ok(self.relays.clone())
    }

    async fn fetch_profile(
        &self,
        identity: &Identity,
    ) -> Result<Option<ProfileSnapshot>, NetworkError> {
        self.state.profile_fetches.fetch_add(1, Ordering::SeqCst);

        let delay = self
            .state
            .fetch_delay
            .lock()
            .map(|d| *d)
            .unwrap_or_default();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.state.fail_fetches.load(Ordering::SeqCst) {
            return Err(NetworkError::Client("relay unreachable".to_string()));
        }

        Ok(self
            .state
            .profiles
            .lock()
            .ok()
            .and_then(|profiles| profiles.get(identity.raw().as_str()).cloned()))
    }

    async fn publish(&self, draft: EventDraft) -> Result<String, NetworkError> {
        let signer = self.signer.as_ref().ok_or(NetworkError::ReadOnly)?;
        let signed = signer.sign_event(draft).await?;
        let id = signed.id.clone();
        if let Ok(mut published) = self.state.published.lock() {
            published.push(signed);
        }
        Ok(id)
    }

    async fn disconnect(&self) -> Result<(), NetworkError> {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Decrement `counter` if positive, reporting whether it was
fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}
