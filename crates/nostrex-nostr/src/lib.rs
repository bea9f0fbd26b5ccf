//! Relay connectivity for the nostrex start page
//!
//! This crate owns everything that talks to a signer or a relay: the shared
//! session with its bounded retries, the per-identity profile cache and the
//! login flow built on top of both. The [`Nostrex`] facade bundles them for
//! user interfaces.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod login;
pub mod metadata;
pub mod profile_cache;
pub mod relay_pool;
pub mod session;
pub mod signer;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use app::Nostrex;
pub use client::{NetworkClient, NetworkClientFactory, UserHandle};
pub use config::{SessionConfig, DEFAULT_PROFILE_TTL, DEFAULT_SESSION_RELAYS};
pub use error::{NetworkError, ProfileError, SessionError, SessionResult, SignerError};
pub use login::{
    AuthenticatedUser, LoginError, LoginFailure, LoginOrchestrator, LoginState, LoginStep,
};
pub use metadata::ProfileSnapshot;
pub use profile_cache::{ProfileCache, ProfileCacheEntry};
pub use relay_pool::{NostrSdkClient, NostrSdkClientFactory};
pub use session::{SessionManager, SessionState};
pub use signer::{
    ChainedSignerProvider, EnvSignerProvider, EventDraft, KeysSigner, SignedEvent, Signer,
    SignerProvider, StaticSignerProvider,
};
