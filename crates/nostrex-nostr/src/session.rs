//! Relay session lifecycle
//!
//! The [`SessionManager`] owns the one live network client of the
//! application. It finds a signer, learns the user's public key, builds the
//! relay pool and publishes its progress through a watch channel. Only one
//! connect runs at a time: a second `connect()` while one is in flight
//! returns immediately, so at most one pool is ever built per attempt.
//!
//! Public reads do not need a signer. When no signed session is live,
//! [`SessionManager::read_client`] opens a separate signer-less pool for them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nostrex_core::{retry, Identity, RetryOutcome};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::client::{NetworkClient, NetworkClientFactory, UserHandle};
use crate::config::SessionConfig;
use crate::error::{NetworkError, SessionError, SessionResult, SignerError};
use crate::signer::{EventDraft, Signer, SignerProvider};

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

/// Observable connection state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected {
        relays: Vec<String>,
        signer: String,
        identity: Identity,
    },
    Failed {
        error: SessionError,
    },
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn error(&self) -> Option<&SessionError> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Everything that exists only while connected
struct LiveSession {
    client: Arc<dyn NetworkClient>,
    signer: Arc<dyn Signer>,
    identity: Identity,
}

/// Clears the in-flight flag when the connect attempt ends, however it ends
struct ConnectGuard<'a>(&'a AtomicBool);

impl<'a> ConnectGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ----------------------------------------------------------------------------
// Session Manager
// ----------------------------------------------------------------------------

pub struct SessionManager {
    config: SessionConfig,
    provider: Arc<dyn SignerProvider>,
    factory: Arc<dyn NetworkClientFactory>,
    state_tx: watch::Sender<SessionState>,
    connecting: AtomicBool,
    live: RwLock<Option<LiveSession>>,
    reader: Mutex<Option<Arc<dyn NetworkClient>>>,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        provider: Arc<dyn SignerProvider>,
        factory: Arc<dyn NetworkClientFactory>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        Self {
            config,
            provider,
            factory,
            state_tx,
            connecting: AtomicBool::new(false),
            live: RwLock::new(None),
            reader: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current state snapshot
    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Error of the last failed attempt, if the session is in the failed state
    pub fn error(&self) -> Option<SessionError> {
        self.state_tx.borrow().error().cloned()
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.state_tx.borrow().is_connected()
    }

    fn set_state(&self, state: SessionState) {
        debug!("Session state -> {:?}", state);
        self.state_tx.send_replace(state);
    }

    // ------------------------------------------------------------------------
    // Connect
    // ------------------------------------------------------------------------

    /// Run the full connect sequence
    ///
    /// Returns immediately when a connect is already in flight or the session
    /// is already connected. Failures are recorded in the state as well as
    /// returned.
    pub async fn connect(&self) -> SessionResult<()> {
        if self.is_connected() {
            debug!("Already connected, skipping connect");
            return Ok(());
        }
        let Some(_guard) = ConnectGuard::acquire(&self.connecting) else {
            debug!("Connect already in flight, skipping");
            return Ok(());
        };
        self.set_state(SessionState::Connecting);

        let result = async {
            let signer = self
                .detect_signer()
                .await
                .ok_or(SessionError::CapabilityNotFound)?;
            let identity = self.acquire_key(&signer).await?;
            self.open_pool(signer, identity).await
        }
        .await;

        self.record_outcome(result)
    }

    /// Warm up, then poll the provider for a signer
    pub async fn detect_signer(&self) -> Option<Arc<dyn Signer>> {
        if !self.config.warm_up.is_zero() {
            sleep(self.config.warm_up).await;
        }

        let outcome = retry(&self.config.detect_policy, "signer detection", |_| async {
            self.provider
                .detect()
                .await
                .ok_or("no signer available")
        })
        .await;

        match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                info!("Found signer '{}' after {} polls", value.name(), attempts);
                Some(value)
            }
            RetryOutcome::Exhausted { attempts, .. } => {
                warn!("No signer found after {} polls", attempts);
                None
            }
        }
    }

    /// Ask the signer for the user's public key
    ///
    /// An empty or malformed key counts as a failed attempt.
    pub async fn acquire_key(&self, signer: &Arc<dyn Signer>) -> SessionResult<Identity> {
        let outcome = retry(&self.config.key_policy, "public key request", |_| async {
            let key = signer.get_public_key().await?;
            Identity::parse(&key).map_err(SignerError::from)
        })
        .await;

        match outcome {
            RetryOutcome::Succeeded { value, .. } => {
                info!("Acquired public key {}", value.raw().short());
                Ok(value)
            }
            RetryOutcome::Exhausted { last_error, .. } => Err(SessionError::KeyUnavailable {
                permission_denied: matches!(last_error, SignerError::PermissionDenied(_)),
                reason: last_error.to_string(),
            }),
        }
    }

    /// Build and open the relay pool for an already acquired identity
    ///
    /// Reuses the live pool when it already belongs to `identity`; a pool for a
    /// different identity is torn down first. Waits for an in-flight connect
    /// instead of starting a second one.
    pub async fn establish(&self, signer: Arc<dyn Signer>, identity: Identity) -> SessionResult<()> {
        loop {
            if let Some(live) = self.live.read().await.as_ref() {
                if live.identity == identity {
                    return Ok(());
                }
            }
            if self.is_connected() {
                info!("Switching session to {}", identity.raw().short());
                self.disconnect().await;
            }

            let Some(_guard) = ConnectGuard::acquire(&self.connecting) else {
                self.wait_until_settled().await;
                continue;
            };
            self.set_state(SessionState::Connecting);
            let result = self.open_pool(signer, identity).await;
            return self.record_outcome(result);
        }
    }

    /// Build a client once, then retry opening it
    ///
    /// A client that never comes up is torn down before the error is returned.
    async fn dial(
        &self,
        signer: Option<Arc<dyn Signer>>,
    ) -> SessionResult<(Arc<dyn NetworkClient>, Vec<String>)> {
        let client = self
            .factory
            .build(&self.config.relays, signer)
            .map_err(|e| SessionError::PoolConnectFailed {
                reason: e.to_string(),
                attempts: 0,
                timed_out: false,
            })?;

        let outcome = retry(&self.config.connect_policy, "relay pool connect", |_| {
            let client = client.clone();
            async move { client.connect().await }
        })
        .await;

        match outcome {
            RetryOutcome::Succeeded { value: relays, .. } => Ok((client, relays)),
            RetryOutcome::Exhausted {
                last_error,
                attempts,
            } => {
                if let Err(e) = client.disconnect().await {
                    warn!("Failed to tear down unusable client: {}", e);
                }
                Err(SessionError::PoolConnectFailed {
                    timed_out: matches!(last_error, NetworkError::Timeout),
                    reason: last_error.to_string(),
                    attempts,
                })
            }
        }
    }

    async fn open_pool(&self, signer: Arc<dyn Signer>, identity: Identity) -> SessionResult<()> {
        let (client, relays) = self.dial(Some(signer.clone())).await?;
        info!(
            "Session connected as {} via {} relays",
            identity.raw().short(),
            relays.len()
        );
        let state = SessionState::Connected {
            relays,
            signer: signer.name().to_string(),
            identity: identity.clone(),
        };
        *self.live.write().await = Some(LiveSession {
            client,
            signer,
            identity,
        });
        self.set_state(state);
        Ok(())
    }

    fn record_outcome(&self, result: SessionResult<()>) -> SessionResult<()> {
        if let Err(e) = &result {
            error!("Session connect failed: {}", e);
            self.set_state(SessionState::Failed { error: e.clone() });
        }
        result
    }

    /// Wait for any in-flight connect to finish
    pub async fn wait_until_settled(&self) {
        if !self.is_connecting() {
            return;
        }
        let mut rx = self.state_tx.subscribe();
        let _ = rx
            .wait_for(|state| !matches!(state, SessionState::Connecting))
            .await;
    }

    /// Live client, connecting first if needed
    pub async fn ensure_connected(&self) -> SessionResult<Arc<dyn NetworkClient>> {
        if let Some(client) = self.client().await {
            return Ok(client);
        }

        if self.is_connecting() {
            self.wait_until_settled().await;
        } else {
            self.connect().await?;
            self.wait_until_settled().await;
        }

        match self.client().await {
            Some(client) => Ok(client),
            None => Err(self.error().unwrap_or(SessionError::NotConnected)),
        }
    }

    /// Client for public reads such as profile lookups
    ///
    /// Prefers the live pool, waiting for an in-flight connect first. Without
    /// one, a signer-less pool is opened and kept until
    /// [`disconnect`](Self::disconnect). Never runs signer detection and never
    /// changes the session state.
    pub async fn read_client(&self) -> SessionResult<Arc<dyn NetworkClient>> {
        self.wait_until_settled().await;
        if let Some(client) = self.client().await {
            return Ok(client);
        }

        let mut reader = self.reader.lock().await;
        if let Some(client) = reader.as_ref() {
            return Ok(client.clone());
        }
        let (client, relays) = self.dial(None).await?;
        info!("Read-only pool open via {} relays", relays.len());
        *reader = Some(client.clone());
        Ok(client)
    }

    // ------------------------------------------------------------------------
    // Live Session Access
    // ------------------------------------------------------------------------

    pub async fn client(&self) -> Option<Arc<dyn NetworkClient>> {
        self.live.read().await.as_ref().map(|live| live.client.clone())
    }

    pub async fn signer(&self) -> Option<Arc<dyn Signer>> {
        self.live.read().await.as_ref().map(|live| live.signer.clone())
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.live.read().await.as_ref().map(|live| live.identity.clone())
    }

    /// Resolve a user against the live client
    pub async fn user(&self, identity: Identity) -> SessionResult<UserHandle> {
        let client = self.ensure_connected().await?;
        Ok(UserHandle::new(identity, client))
    }

    /// Sign and send a draft through the pool
    pub async fn publish(&self, draft: EventDraft) -> SessionResult<String> {
        let client = self.client().await.ok_or(SessionError::NotConnected)?;
        client
            .publish(draft)
            .await
            .map_err(|e| SessionError::PublishFailed(e.to_string()))
    }

    /// Tear down the live pool and any read-only pool
    ///
    /// Each pool is taken out before teardown, so every successful connect is
    /// torn down exactly once no matter how often this is called.
    pub async fn disconnect(&self) {
        let live = self.live.write().await.take();
        if let Some(live) = live {
            match live.client.disconnect().await {
                Ok(()) => info!("Session for {} closed", live.identity.raw().short()),
                Err(e) => warn!("Error while disconnecting relays: {}", e),
            }
        }

        let reader = self.reader.lock().await.take();
        if let Some(reader) = reader {
            match reader.disconnect().await {
                Ok(()) => debug!("Read-only pool closed"),
                Err(e) => warn!("Error while disconnecting read-only pool: {}", e),
            }
        }
        self.set_state(SessionState::Disconnected);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNetwork, FakeSigner, ScriptedSignerProvider};
    use std::time::Duration;
    use tokio::time::Instant;

    fn manager(provider: ScriptedSignerProvider, network: &FakeNetwork) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            SessionConfig::default(),
            Arc::new(provider),
            Arc::new(network.factory()),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_connects_build_one_pool() {
        let network = FakeNetwork::new();
        let session = manager(ScriptedSignerProvider::present(FakeSigner::valid()), &network);

        let (a, b) = tokio::join!(session.connect(), session.connect());
        assert!(a.is_ok());
        assert!(b.is_ok());

        assert_eq!(network.builds(), 1);
        assert!(session.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timing_and_state() {
        let network = FakeNetwork::new();
        let session = manager(ScriptedSignerProvider::after_polls(2, FakeSigner::valid()), &network);
        let started = Instant::now();

        session.connect().await.unwrap();

        // 500ms warm-up plus two 1s gaps between polls
        assert_eq!(started.elapsed(), Duration::from_millis(2500));
        match session.state() {
            SessionState::Connected { relays, signer, .. } => {
                assert_eq!(relays.len(), SessionConfig::default().relays.len());
                assert_eq!(signer, "fake");
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_capability_fails() {
        let network = FakeNetwork::new();
        let session = manager(ScriptedSignerProvider::absent(), &network);

        let result = session.connect().await;
        assert_eq!(result, Err(SessionError::CapabilityNotFound));
        assert_eq!(session.error(), Some(SessionError::CapabilityNotFound));
        assert_eq!(network.builds(), 0);
        assert!(!session.is_connecting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_denied_is_classified() {
        let network = FakeNetwork::new();
        let session = manager(
            ScriptedSignerProvider::present(FakeSigner::denying()),
            &network,
        );

        match session.connect().await {
            Err(SessionError::KeyUnavailable {
                permission_denied, ..
            }) => assert!(permission_denied),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_key_counts_as_unavailable() {
        let network = FakeNetwork::new();
        let session = manager(
            ScriptedSignerProvider::present(FakeSigner::with_key("not-a-key")),
            &network,
        );

        assert!(matches!(
            session.connect().await,
            Err(SessionError::KeyUnavailable {
                permission_denied: false,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_failure_tears_down_client() {
        let network = FakeNetwork::new();
        network.fail_connects(10);
        let session = manager(ScriptedSignerProvider::present(FakeSigner::valid()), &network);

        let result = session.connect().await;
        assert!(matches!(
            result,
            Err(SessionError::PoolConnectFailed { attempts: 3, .. })
        ));
        assert_eq!(network.builds(), 1);
        assert_eq!(network.connect_calls(), 3);
        assert_eq!(network.disconnects(), 1);
        assert!(session.client().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_recovers_within_retry_budget() {
        let network = FakeNetwork::new();
        network.fail_connects(2);
        let session = manager(ScriptedSignerProvider::present(FakeSigner::valid()), &network);

        session.connect().await.unwrap();
        assert_eq!(network.builds(), 1);
        assert_eq!(network.connect_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_runs_once() {
        let network = FakeNetwork::new();
        let session = manager(ScriptedSignerProvider::present(FakeSigner::valid()), &network);
        session.connect().await.unwrap();

        session.disconnect().await;
        session.disconnect().await;

        assert_eq!(network.disconnects(), 1);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_connected_waits_for_in_flight_connect() {
        let network = FakeNetwork::new();
        let session = manager(ScriptedSignerProvider::present(FakeSigner::valid()), &network);

        let background = {
            let session = session.clone();
            tokio::spawn(async move { session.connect().await })
        };
        tokio::task::yield_now().await;
        assert!(session.is_connecting());

        let client = session.ensure_connected().await;
        assert!(client.is_ok());
        background.await.unwrap().unwrap();
        assert_eq!(network.builds(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_requires_connection() {
        let network = FakeNetwork::new();
        let session = manager(ScriptedSignerProvider::present(FakeSigner::valid()), &network);

        assert_eq!(
            session.publish(EventDraft::text_note("hi")).await,
            Err(SessionError::NotConnected)
        );

        session.connect().await.unwrap();
        let id = session.publish(EventDraft::text_note("hi")).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(network.published().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_client_without_signer_opens_unsigned_pool() {
        let network = FakeNetwork::new();
        let provider = Arc::new(ScriptedSignerProvider::absent());
        let session = Arc::new(SessionManager::new(
            SessionConfig::default(),
            provider.clone(),
            Arc::new(network.factory()),
        ));

        let (a, b) = tokio::join!(session.read_client(), session.read_client());
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(network.builds(), 1);
        assert_eq!(network.unsigned_builds(), 1);
        assert_eq!(provider.polls(), 0);
        assert_eq!(session.state(), SessionState::Disconnected);

        assert_eq!(
            a.unwrap().publish(EventDraft::text_note("hi")).await,
            Err(NetworkError::ReadOnly)
        );

        session.disconnect().await;
        session.disconnect().await;
        assert_eq!(network.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_client_prefers_live_pool() {
        let network = FakeNetwork::new();
        let session = manager(ScriptedSignerProvider::present(FakeSigner::valid()), &network);
        session.connect().await.unwrap();

        session.read_client().await.unwrap();
        assert_eq!(network.builds(), 1);
        assert_eq!(network.unsigned_builds(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_timeout_is_classified() {
        let network = FakeNetwork::new();
        network.time_out_connects(3);
        let session = manager(ScriptedSignerProvider::present(FakeSigner::valid()), &network);

        assert!(matches!(
            session.connect().await,
            Err(SessionError::PoolConnectFailed {
                timed_out: true,
                attempts: 3,
                ..
            })
        ));

        network.fail_connects(3);
        assert!(matches!(
            session.connect().await,
            Err(SessionError::PoolConnectFailed {
                timed_out: false,
                ..
            })
        ));
    }
}
