//! Error types for the relay session layer
//!
//! Network and signer errors stay close to their source. Everything that
//! crosses a component boundary is `Clone` so it can live inside observable
//! state.

use nostrex_core::IdentityError;
use thiserror::Error;

// ----------------------------------------------------------------------------
// Signer Errors
// ----------------------------------------------------------------------------

/// Errors raised by a signing capability
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("Signer denied the request: {0}")]
    PermissionDenied(String),

    #[error("Public key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("Signer returned an invalid public key: {0}")]
    InvalidKey(#[from] IdentityError),

    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

// ----------------------------------------------------------------------------
// Network Errors
// ----------------------------------------------------------------------------

/// Errors raised by the network client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid relay URL: {url}")]
    InvalidRelayUrl { url: String },

    #[error("Failed to add relay {relay}: {reason}")]
    RelayRejected { relay: String, reason: String },

    #[error("No relay accepted the connection")]
    NoRelayConnected,

    #[error("Relay request timed out")]
    Timeout,

    #[error("Client has no signer and cannot publish")]
    ReadOnly,

    #[error("Nostr client error: {0}")]
    Client(String),

    #[error("Malformed event: {0}")]
    InvalidEvent(String),

    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),
}

impl From<nostr_sdk::client::Error> for NetworkError {
    fn from(err: nostr_sdk::client::Error) -> Self {
        NetworkError::Client(err.to_string())
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        NetworkError::InvalidEvent(err.to_string())
    }
}

// ----------------------------------------------------------------------------
// Session Errors
// ----------------------------------------------------------------------------

/// Terminal outcome of a failed session step
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No signing capability found")]
    CapabilityNotFound,

    #[error("Public key unavailable: {reason}")]
    KeyUnavailable {
        reason: String,
        permission_denied: bool,
    },

    #[error("Could not connect to the relay pool after {attempts} attempts: {reason}")]
    PoolConnectFailed {
        reason: String,
        attempts: u32,
        timed_out: bool,
    },

    #[error("Not connected to the relay pool")]
    NotConnected,

    #[error("Publishing failed: {0}")]
    PublishFailed(String),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

// ----------------------------------------------------------------------------
// Profile Errors
// ----------------------------------------------------------------------------

/// Classified profile lookup failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("No profile published for {identity}")]
    ProfileNotFound { identity: String },

    #[error("Profile fetch failed: {0}")]
    FetchError(String),

    #[error(transparent)]
    InvalidIdentity(#[from] IdentityError),
}

impl ProfileError {
    /// Message suitable for showing to the user
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ProfileNotFound { .. } => "No profile has been published for this user yet.",
            Self::FetchError(_) => "Could not load the profile. Please try again.",
            Self::InvalidIdentity(_) => "That is not a valid npub or hex public key.",
        }
    }
}
