//! Login orchestration
//!
//! A login walks through capability detection, key acquisition, user
//! resolution and profile fetch, in that order. Each step calls into the
//! session or profile cache exactly once; those components already retry
//! internally. A missing profile does not fail the login.

use std::sync::Arc;

use nostrex_core::{EncryptedStore, Identity, IdentityRecord, IDENTITY_KEY};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::SessionError;
use crate::metadata::ProfileSnapshot;
use crate::profile_cache::ProfileCache;
use crate::session::SessionManager;

// ----------------------------------------------------------------------------
// Login State
// ----------------------------------------------------------------------------

/// Step of a running login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    DetectingCapability,
    AcquiringKey,
    ResolvingUser,
    FetchingProfile,
}

impl std::fmt::Display for LoginStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DetectingCapability => "detecting signer",
            Self::AcquiringKey => "requesting public key",
            Self::ResolvingUser => "connecting to relays",
            Self::FetchingProfile => "fetching profile",
        };
        f.write_str(name)
    }
}

/// Observable login progress
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoginState {
    #[default]
    Idle,
    Running(LoginStep),
    Authenticated,
    Failed {
        step: LoginStep,
        reason: LoginFailure,
    },
}

/// Why a login stopped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    #[error("no signing capability found")]
    CapabilityNotFound,

    #[error("signer denied access to the public key")]
    PermissionDenied,

    #[error("public key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("relay connection timed out")]
    Timeout,
}

impl LoginFailure {
    /// Message suitable for showing to the user
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::CapabilityNotFound => {
                "Nostr signer not found. Please install or configure one and try again."
            }
            Self::PermissionDenied => {
                "The signer refused to share your public key. Please check its permissions."
            }
            Self::KeyUnavailable(_) => {
                "Could not get public key. Please check signer permissions."
            }
            Self::Network(_) => {
                "Could not connect to any relay. Please check your connection and try again."
            }
            Self::Timeout => "The relays took too long to respond. Please try again.",
        }
    }
}

impl From<SessionError> for LoginFailure {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::CapabilityNotFound => Self::CapabilityNotFound,
            SessionError::KeyUnavailable {
                permission_denied: true,
                ..
            } => Self::PermissionDenied,
            SessionError::KeyUnavailable { reason, .. } => Self::KeyUnavailable(reason),
            SessionError::PoolConnectFailed {
                timed_out: true, ..
            } => Self::Timeout,
            other => Self::Network(other.to_string()),
        }
    }
}

/// Terminal login failure with the step it happened in
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Login failed while {step}: {reason}")]
pub struct LoginError {
    pub step: LoginStep,
    pub reason: LoginFailure,
}

impl LoginError {
    pub fn user_message(&self) -> &'static str {
        self.reason.user_message()
    }
}

/// Result of a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub identity: Identity,
    pub record: IdentityRecord,
    pub profile: Option<ProfileSnapshot>,
}

// ----------------------------------------------------------------------------
// Login Orchestrator
// ----------------------------------------------------------------------------

pub struct LoginOrchestrator {
    session: Arc<SessionManager>,
    profiles: Arc<ProfileCache>,
    store: EncryptedStore,
    state_tx: watch::Sender<LoginState>,
}

impl LoginOrchestrator {
    pub fn new(
        session: Arc<SessionManager>,
        profiles: Arc<ProfileCache>,
        store: EncryptedStore,
    ) -> Self {
        let (state_tx, _) = watch::channel(LoginState::Idle);
        Self {
            session,
            profiles,
            store,
            state_tx,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoginState> {
        self.state_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state_tx.borrow(), LoginState::Running(_))
    }

    fn enter(&self, step: LoginStep) {
        info!("Login: {}", step);
        self.state_tx.send_replace(LoginState::Running(step));
    }

    fn fail(&self, step: LoginStep, reason: LoginFailure) -> LoginError {
        error!("Login failed while {}: {}", step, reason);
        self.state_tx.send_replace(LoginState::Failed {
            step,
            reason: reason.clone(),
        });
        LoginError { step, reason }
    }

    /// Run one login attempt
    pub async fn login(&self) -> Result<AuthenticatedUser, LoginError> {
        self.enter(LoginStep::DetectingCapability);
        let Some(signer) = self.session.detect_signer().await else {
            return Err(self.fail(LoginStep::DetectingCapability, LoginFailure::CapabilityNotFound));
        };

        self.enter(LoginStep::AcquiringKey);
        let identity = match self.session.acquire_key(&signer).await {
            Ok(identity) => identity,
            Err(e) => return Err(self.fail(LoginStep::AcquiringKey, e.into())),
        };

        self.enter(LoginStep::ResolvingUser);
        if let Err(e) = self.session.establish(signer, identity.clone()).await {
            return Err(self.fail(LoginStep::ResolvingUser, e.into()));
        }
        let user = match self.session.user(identity.clone()).await {
            Ok(user) => user,
            Err(e) => return Err(self.fail(LoginStep::ResolvingUser, e.into())),
        };

        self.enter(LoginStep::FetchingProfile);
        let profile = self
            .profiles
            .fetch_profile(user.identity().raw().as_str(), false)
            .await;
        if profile.is_none() {
            warn!("Continuing login without a profile");
        }

        let record = IdentityRecord::from_identity(&identity);
        if let Err(e) = self.store.update(IDENTITY_KEY, &record) {
            warn!("Failed to persist identity record: {}", e);
        }

        self.state_tx.send_replace(LoginState::Authenticated);
        info!("Logged in as {}", identity);
        Ok(AuthenticatedUser {
            identity,
            record,
            profile,
        })
    }

    /// Forget the stored identity and close the session
    pub async fn logout(&self) {
        if let Err(e) = self.store.remove(IDENTITY_KEY) {
            warn!("Failed to remove identity record: {}", e);
        }
        self.session.disconnect().await;
        self.state_tx.send_replace(LoginState::Idle);
        info!("Logged out");
    }

    /// Identity persisted by a previous login, if any
    ///
    /// A missing, corrupt or unparsable record reads as logged out.
    pub fn restore(&self) -> Option<IdentityRecord> {
        let record: IdentityRecord = self.store.get_or_default(IDENTITY_KEY);
        if record.raw().is_empty() {
            return None;
        }
        Some(record)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::SessionState;
    use crate::signer::SignerProvider;
    use crate::testing::{FakeNetwork, FakeSigner, ScriptedSignerProvider};
    use nostrex_core::{MemoryNamespace, StoreSecret, SystemTimeSource};

    fn orchestrator(
        provider: impl SignerProvider + 'static,
        network: &FakeNetwork,
    ) -> (LoginOrchestrator, Arc<SessionManager>, EncryptedStore) {
        let session = Arc::new(SessionManager::new(
            SessionConfig::default(),
            Arc::new(provider),
            Arc::new(network.factory()),
        ));
        let profiles = Arc::new(ProfileCache::new(session.clone(), Arc::new(SystemTimeSource)));
        let store = EncryptedStore::new(
            Arc::new(MemoryNamespace::new()),
            &StoreSecret::from_passphrase("login-tests").unwrap(),
        );
        (
            LoginOrchestrator::new(session.clone(), profiles, store.clone()),
            session,
            store,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_capability_leaves_session_disconnected() {
        let network = FakeNetwork::new();
        let (login, session, store) = orchestrator(ScriptedSignerProvider::absent(), &network);

        let err = login.login().await.unwrap_err();
        assert_eq!(err.step, LoginStep::DetectingCapability);
        assert_eq!(err.reason, LoginFailure::CapabilityNotFound);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!store.contains(IDENTITY_KEY));
        assert!(login.restore().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_is_reported() {
        let network = FakeNetwork::new();
        let (login, _, _) = orchestrator(
            ScriptedSignerProvider::present(FakeSigner::denying()),
            &network,
        );

        let err = login.login().await.unwrap_err();
        assert_eq!(err.step, LoginStep::AcquiringKey);
        assert_eq!(err.reason, LoginFailure::PermissionDenied);
        assert!(err.user_message().contains("permissions"));
        assert_eq!(network.builds(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_failure_is_a_network_failure() {
        let network = FakeNetwork::new();
        network.fail_connects(3);
        let (login, session, _) = orchestrator(
            ScriptedSignerProvider::present(FakeSigner::valid()),
            &network,
        );

        let err = login.login().await.unwrap_err();
        assert_eq!(err.step, LoginStep::ResolvingUser);
        assert!(matches!(err.reason, LoginFailure::Network(_)));
        assert!(matches!(session.state(), SessionState::Failed { .. }));
        assert!(matches!(login.state(), LoginState::Failed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_persists_identity_without_profile() {
        let key = "abc123".to_string() + &"0".repeat(58);
        let network = FakeNetwork::new();
        let (login, session, store) = orchestrator(
            ScriptedSignerProvider::present(FakeSigner::with_key(key.clone())),
            &network,
        );

        let user = login.login().await.unwrap();
        assert_eq!(user.identity.raw().as_str(), key);
        assert!(user.profile.is_none());
        assert_eq!(login.state(), LoginState::Authenticated);
        assert!(session.is_connected());
        assert_eq!(network.builds(), 1);
        assert_eq!(network.connect_calls(), 1);

        let stored: IdentityRecord = store.get_or_default(IDENTITY_KEY);
        assert_eq!(stored.raw_key, key);
        assert_eq!(login.restore(), Some(stored));
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_forgets_identity() {
        let network = FakeNetwork::new();
        let (login, session, store) = orchestrator(
            ScriptedSignerProvider::present(FakeSigner::valid()),
            &network,
        );
        login.login().await.unwrap();

        login.logout().await;
        assert!(!store.contains(IDENTITY_KEY));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(login.state(), LoginState::Idle);
        assert_eq!(network.disconnects(), 1);
    }
}
