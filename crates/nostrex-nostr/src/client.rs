//! Network client abstraction
//!
//! The session never talks to relays directly. It asks a
//! [`NetworkClientFactory`] for a client bound to a relay set and, for the
//! signed session, a signer, then drives that client through this trait. Production code uses the
//! `nostr-sdk` backed pool in [`crate::relay_pool`].

use std::sync::Arc;

use async_trait::async_trait;
use nostrex_core::Identity;

use crate::error::NetworkError;
use crate::metadata::ProfileSnapshot;
use crate::signer::{EventDraft, Signer};

/// Connection to a pool of relays
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Relay URLs this client was built with
    fn relays(&self) -> Vec<String>;

    /// Open the pool, returning the relays that came up
    ///
    /// Fails unless at least one relay is connected. Safe to call again after
    /// a failure.
    async fn connect(&self) -> Result<Vec<String>, NetworkError>;

    /// Latest kind:0 metadata for `identity`, `None` if nothing is published
    async fn fetch_profile(&self, identity: &Identity)
        -> Result<Option<ProfileSnapshot>, NetworkError>;

    /// Sign `draft` with the client's signer and send it, returning the event id
    ///
    /// Clients built without a signer fail with [`NetworkError::ReadOnly`].
    async fn publish(&self, draft: EventDraft) -> Result<String, NetworkError>;

    /// Stop listeners and disconnect every relay
    async fn disconnect(&self) -> Result<(), NetworkError>;
}

/// Builds network clients; `signer: None` yields a read-only client
pub trait NetworkClientFactory: Send + Sync {
    fn build(
        &self,
        relays: &[String],
        signer: Option<Arc<dyn Signer>>,
    ) -> Result<Arc<dyn NetworkClient>, NetworkError>;
}

// ----------------------------------------------------------------------------
// User Handle
// ----------------------------------------------------------------------------

/// A user resolved against a live client
#[derive(Clone)]
pub struct UserHandle {
    identity: Identity,
    client: Arc<dyn NetworkClient>,
}

impl std::fmt::Debug for UserHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserHandle")
            .field("identity", &self.identity)
            .finish()
    }
}

impl UserHandle {
    pub fn new(identity: Identity, client: Arc<dyn NetworkClient>) -> Self {
        Self { identity, client }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn npub(&self) -> Option<&str> {
        self.identity.encoded()
    }

    pub async fn fetch_profile(&self) -> Result<Option<ProfileSnapshot>, NetworkError> {
        self.client.fetch_profile(&self.identity).await
    }
}
