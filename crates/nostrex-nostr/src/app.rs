//! Front door for UI collaborators
//!
//! [`Nostrex`] wires the session, profile cache and login flow together and
//! keeps the few observable fields a user interface needs: the current
//! profile, a loading flag and the last user-facing error message.

use std::sync::Arc;

use nostrex_core::{EncryptedStore, IdentityRecord, TimeSource};
use tokio::sync::{watch, RwLock};

use crate::client::NetworkClientFactory;
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::login::{AuthenticatedUser, LoginError, LoginFailure, LoginOrchestrator, LoginState};
use crate::metadata::ProfileSnapshot;
use crate::profile_cache::ProfileCache;
use crate::relay_pool::NostrSdkClientFactory;
use crate::session::{SessionManager, SessionState};
use crate::signer::{EventDraft, SignerProvider};

pub struct Nostrex {
    session: Arc<SessionManager>,
    profiles: Arc<ProfileCache>,
    login: LoginOrchestrator,
    store: EncryptedStore,
    profile: RwLock<Option<ProfileSnapshot>>,
    error: RwLock<Option<String>>,
}

impl Nostrex {
    pub fn new(
        config: SessionConfig,
        provider: Arc<dyn SignerProvider>,
        factory: Arc<dyn NetworkClientFactory>,
        store: EncryptedStore,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        let session = Arc::new(SessionManager::new(config, provider, factory));
        let profiles = Arc::new(ProfileCache::new(session.clone(), time_source));
        let login = LoginOrchestrator::new(session.clone(), profiles.clone(), store.clone());

        Self {
            session,
            profiles,
            login,
            store,
            profile: RwLock::new(None),
            error: RwLock::new(None),
        }
    }

    /// Production wiring over `nostr-sdk`
    pub fn with_nostr_sdk(
        config: SessionConfig,
        provider: Arc<dyn SignerProvider>,
        store: EncryptedStore,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        let factory = Arc::new(NostrSdkClientFactory::new(&config));
        Self::new(config, provider, factory, store, time_source)
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    pub async fn connect(&self) -> SessionResult<()> {
        let result = self.session.connect().await;
        self.record_session_result(&result).await;
        result
    }

    /// Fetch and remember a profile; the reason for a `None` lands in [`error`](Self::error)
    pub async fn fetch_profile(&self, identity: &str, force: bool) -> Option<ProfileSnapshot> {
        match self.profiles.try_fetch_profile(identity, force).await {
            Ok(profile) => {
                *self.profile.write().await = Some(profile.clone());
                *self.error.write().await = None;
                Some(profile)
            }
            Err(e) => {
                *self.error.write().await = Some(e.user_message().to_string());
                None
            }
        }
    }

    pub async fn login(&self) -> Result<AuthenticatedUser, LoginError> {
        let result = self.login.login().await;
        match &result {
            Ok(user) => {
                *self.profile.write().await = user.profile.clone();
                *self.error.write().await = None;
            }
            Err(e) => *self.error.write().await = Some(e.user_message().to_string()),
        }
        result
    }

    pub async fn logout(&self) {
        self.login.logout().await;
        *self.profile.write().await = None;
        *self.error.write().await = None;
    }

    /// Identity remembered from a previous login
    pub fn restore(&self) -> Option<IdentityRecord> {
        self.login.restore()
    }

    /// Sign a text note with the session signer and publish it
    pub async fn publish_note(&self, content: &str) -> SessionResult<String> {
        let result = match self.session.ensure_connected().await {
            Ok(_) => self.session.publish(EventDraft::text_note(content)).await,
            Err(e) => Err(e),
        };
        self.record_session_result(&result).await;
        result
    }

    async fn record_session_result<T>(&self, result: &SessionResult<T>) {
        let message = match result {
            Ok(_) => None,
            Err(SessionError::PublishFailed(reason)) => Some(format!("Could not publish: {}", reason)),
            Err(e) => Some(LoginFailure::from(e.clone()).user_message().to_string()),
        };
        *self.error.write().await = message;
    }

    // ------------------------------------------------------------------------
    // Observables
    // ------------------------------------------------------------------------

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn subscribe_session(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    pub fn login_state(&self) -> LoginState {
        self.login.state()
    }

    pub async fn profile(&self) -> Option<ProfileSnapshot> {
        self.profile.read().await.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.session.is_connecting() || self.login.is_running() || self.profiles.is_loading().await
    }

    /// Last user-facing error message
    pub async fn error(&self) -> Option<String> {
        self.error.read().await.clone()
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn profiles(&self) -> &Arc<ProfileCache> {
        &self.profiles
    }

    pub fn store(&self) -> &EncryptedStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNetwork, FakeSigner, ScriptedSignerProvider};
    use nostr_sdk::Keys;
    use nostrex_core::{MemoryNamespace, StoreSecret, SystemTimeSource};

    fn app(provider: ScriptedSignerProvider, network: &FakeNetwork) -> Nostrex {
        Nostrex::new(
            SessionConfig::default(),
            Arc::new(provider),
            Arc::new(network.factory()),
            EncryptedStore::new(Arc::new(MemoryNamespace::new()), &StoreSecret::generate()),
            Arc::new(SystemTimeSource),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_login_sets_user_message() {
        let network = FakeNetwork::new();
        let app = app(ScriptedSignerProvider::absent(), &network);

        assert!(app.login().await.is_err());
        assert!(app.error().await.unwrap().contains("signer not found"));
        assert!(app.profile().await.is_none());
        assert!(!app.is_loading().await);
        assert_eq!(app.session_state(), SessionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_exposes_profile() {
        let keys = Keys::generate();
        let network = FakeNetwork::new();
        network.set_profile(
            &keys.public_key().to_hex(),
            ProfileSnapshot {
                display_name: Some("Dana".into()),
                ..ProfileSnapshot::default()
            },
        );
        let app = app(
            ScriptedSignerProvider::present(FakeSigner::with_key(keys.public_key().to_hex())),
            &network,
        );

        let user = app.login().await.unwrap();
        assert_eq!(user.profile.as_ref().and_then(|p| p.best_name()), Some("Dana"));
        assert_eq!(app.profile().await, user.profile);
        assert!(app.error().await.is_none());
        assert_eq!(app.restore(), Some(user.record));

        app.logout().await;
        assert!(app.profile().await.is_none());
        assert!(app.restore().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_profile_lookup_sets_error() {
        let network = FakeNetwork::new();
        let app = app(ScriptedSignerProvider::present(FakeSigner::valid()), &network);

        assert!(app.fetch_profile("nsec1nope", false).await.is_none());
        assert!(app.error().await.unwrap().contains("not a valid"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_note_connects_first() {
        let network = FakeNetwork::new();
        let app = app(ScriptedSignerProvider::present(FakeSigner::valid()), &network);

        let id = app.publish_note("gm").await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(network.published()[0].content, "gm");
        assert!(app.session_state().is_connected());
    }
}
