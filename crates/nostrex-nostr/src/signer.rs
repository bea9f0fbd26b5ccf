//! Signing capability
//!
//! A [`Signer`] produces the user's public key and signs event drafts without
//! handing the secret to the rest of the application. Whether a signer is
//! present at all is an environment question answered by a
//! [`SignerProvider`], which the session polls.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use nostr_sdk::{EventBuilder, JsonUtil, Keys, Kind, Tag, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SignerError;

// ----------------------------------------------------------------------------
// Event Types
// ----------------------------------------------------------------------------

/// Unsigned event content handed to a signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub kind: u16,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    /// Seconds since epoch; the signer picks "now" when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
}

impl EventDraft {
    /// A kind:1 text note
    pub fn text_note(content: impl Into<String>) -> Self {
        Self {
            kind: 1,
            content: content.into(),
            tags: Vec::new(),
            created_at: None,
        }
    }
}

/// A signed event in NIP-01 wire shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEvent {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

// ----------------------------------------------------------------------------
// Signer Traits
// ----------------------------------------------------------------------------

/// Something that can hand out a public key and sign on the user's behalf
#[async_trait]
pub trait Signer: Send + Sync + Debug {
    /// Human-readable signer name for status output
    fn name(&self) -> &str;

    /// Public key as 64-char hex
    async fn get_public_key(&self) -> Result<String, SignerError>;

    async fn sign_event(&self, draft: EventDraft) -> Result<SignedEvent, SignerError>;
}

/// Answers "is a signer available right now?"
#[async_trait]
pub trait SignerProvider: Send + Sync {
    async fn detect(&self) -> Option<Arc<dyn Signer>>;
}

// ----------------------------------------------------------------------------
// Local Keys Signer
// ----------------------------------------------------------------------------

/// Signer backed by a locally held secret key
pub struct KeysSigner {
    keys: Keys,
    name: String,
}

impl Debug for KeysSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeysSigner")
            .field("name", &self.name)
            .field("public_key", &self.keys.public_key().to_hex())
            .finish()
    }
}

impl KeysSigner {
    pub fn new(keys: Keys, name: impl Into<String>) -> Self {
        Self {
            keys,
            name: name.into(),
        }
    }

    /// Parse an `nsec1...` or hex secret key
    pub fn from_secret(secret: &str, name: impl Into<String>) -> Result<Self, SignerError> {
        let keys = Keys::parse(secret.trim())
            .map_err(|e| SignerError::KeyUnavailable(format!("invalid secret key: {}", e)))?;
        Ok(Self::new(keys, name))
    }

    pub fn keys(&self) -> &Keys {
        &self.keys
    }
}

#[async_trait]
impl Signer for KeysSigner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_public_key(&self) -> Result<String, SignerError> {
        Ok(self.keys.public_key().to_hex())
    }

    async fn sign_event(&self, draft: EventDraft) -> Result<SignedEvent, SignerError> {
        let mut tags = Vec::with_capacity(draft.tags.len());
        for tag in &draft.tags {
            let tag = Tag::parse(tag.as_slice())
                .map_err(|e| SignerError::SigningFailed(format!("invalid tag: {}", e)))?;
            tags.push(tag);
        }

        let mut builder = EventBuilder::new(Kind::from(draft.kind), draft.content, tags);
        if let Some(created_at) = draft.created_at {
            builder = builder.custom_created_at(Timestamp::from(created_at));
        }

        let event = builder
            .to_event(&self.keys)
            .map_err(|e| SignerError::SigningFailed(e.to_string()))?;

        serde_json::from_str(&event.as_json())
            .map_err(|e| SignerError::SigningFailed(format!("unexpected event shape: {}", e)))
    }
}

// ----------------------------------------------------------------------------
// Providers
// ----------------------------------------------------------------------------

/// Looks for a secret key in an environment variable on every poll
///
/// The variable is re-read each time so a key exported while the process is
/// waiting is still picked up.
#[derive(Debug, Clone)]
pub struct EnvSignerProvider {
    var: String,
}

impl EnvSignerProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

#[async_trait]
impl SignerProvider for EnvSignerProvider {
    async fn detect(&self) -> Option<Arc<dyn Signer>> {
        let secret = std::env::var(&self.var).ok().filter(|s| !s.trim().is_empty())?;
        match KeysSigner::from_secret(&secret, format!("env:{}", self.var)) {
            Ok(signer) => {
                debug!("Found signer in {}", self.var);
                Some(Arc::new(signer))
            }
            Err(e) => {
                warn!("Ignoring {}: {}", self.var, e);
                None
            }
        }
    }
}

/// Provider with a fixed answer
#[derive(Debug, Clone, Default)]
pub struct StaticSignerProvider {
    signer: Option<Arc<dyn Signer>>,
}

impl StaticSignerProvider {
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self {
            signer: Some(signer),
        }
    }

    /// A provider that never finds a signer
    pub fn absent() -> Self {
        Self { signer: None }
    }
}

#[async_trait]
impl SignerProvider for StaticSignerProvider {
    async fn detect(&self) -> Option<Arc<dyn Signer>> {
        self.signer.clone()
    }
}

/// Tries each provider in order, returning the first signer found
pub struct ChainedSignerProvider {
    providers: Vec<Arc<dyn SignerProvider>>,
}

impl ChainedSignerProvider {
    pub fn new(providers: Vec<Arc<dyn SignerProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl SignerProvider for ChainedSignerProvider {
    async fn detect(&self) -> Option<Arc<dyn Signer>> {
        for provider in &self.providers {
            if let Some(signer) = provider.detect().await {
                return Some(signer);
            }
        }
        None
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
