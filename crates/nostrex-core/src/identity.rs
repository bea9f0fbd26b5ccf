//! Identity codec
//!
//! Converts user-supplied identity strings between the shareable NIP-19
//! `npub1...` form and the canonical 64-character lowercase hex form used on
//! the wire. The codec is stateless; every entry point that accepts an
//! identity from a user runs it through [`normalize`] or [`Identity::parse`].

use core::fmt;
use core::str::FromStr;

use nostr_sdk::{FromBech32, PublicKey, ToBech32};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::IdentityError;

/// Human-readable prefix of bech32 encoded public keys
pub const NPUB_PREFIX: &str = "npub1";

/// Length of a canonical hex public key
pub const PUBLIC_KEY_HEX_LEN: usize = 64;

// ----------------------------------------------------------------------------
// Canonical Hex Key
// ----------------------------------------------------------------------------

/// Canonical public key: 64 lowercase hex characters, or the empty sentinel
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKeyHex(String);

impl PublicKeyHex {
    /// The "no identity" sentinel
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Whether this is the empty sentinel
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Shortened form for log lines and status output (`abcd1234...89ef`)
    pub fn short(&self) -> String {
        if self.0.len() <= 16 {
            return self.0.clone();
        }
        format!("{}...{}", &self.0[..8], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for PublicKeyHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PublicKeyHex {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for PublicKeyHex {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        try_normalize(s)
    }
}

// ----------------------------------------------------------------------------
// Codec
// ----------------------------------------------------------------------------

/// Normalize an identity string, returning the empty sentinel on bad input
///
/// Callers must check [`PublicKeyHex::is_empty`] before using the result.
pub fn normalize(input: &str) -> PublicKeyHex {
    match try_normalize(input) {
        Ok(key) => key,
        Err(e) => {
            debug!("Rejected identity input: {}", e);
            PublicKeyHex::empty()
        }
    }
}

/// Normalize an identity string into canonical hex
pub fn try_normalize(input: &str) -> Result<PublicKeyHex, IdentityError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(IdentityError::Empty);
    }

    if trimmed.starts_with(NPUB_PREFIX) {
        let public_key = PublicKey::from_bech32(trimmed).map_err(|e| {
            IdentityError::InvalidBech32 {
                reason: e.to_string(),
            }
        })?;
        return Ok(PublicKeyHex(public_key.to_hex()));
    }

    // Any other bech32 entity (nsec, note, nprofile...) is not a public key
    if trimmed.len() != PUBLIC_KEY_HEX_LEN {
        if trimmed.starts_with('n') && trimmed.contains('1') {
            return Err(IdentityError::UnsupportedPrefix {
                input: trimmed.to_string(),
            });
        }
        return Err(IdentityError::InvalidLength {
            length: trimmed.len(),
        });
    }

    if !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(IdentityError::InvalidHex);
    }

    Ok(PublicKeyHex(trimmed.to_ascii_lowercase()))
}

/// Encode a canonical key as `npub1...`
pub fn encode(raw: &PublicKeyHex) -> Result<String, IdentityError> {
    if raw.is_empty() {
        return Err(IdentityError::Empty);
    }

    let public_key = PublicKey::from_hex(raw.as_str()).map_err(|_| IdentityError::NotEncodable {
        raw: raw.to_string(),
    })?;

    public_key
        .to_bech32()
        .map_err(|e| IdentityError::InvalidBech32 {
            reason: e.to_string(),
        })
}

// ----------------------------------------------------------------------------
// Identity
// ----------------------------------------------------------------------------

/// A user identity: canonical key plus optional shareable alias
///
/// Identities are immutable; a changed identity is a new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    raw: PublicKeyHex,
    encoded: Option<String>,
}

impl Identity {
    /// Parse user input in either form
    pub fn parse(input: &str) -> Result<Self, IdentityError> {
        let raw = try_normalize(input)?;
        let trimmed = input.trim();
        let encoded = if trimmed.starts_with(NPUB_PREFIX) {
            Some(trimmed.to_string())
        } else {
            encode(&raw).ok()
        };

        Ok(Self { raw, encoded })
    }

    /// Build from an already canonical key
    pub fn from_raw(raw: PublicKeyHex) -> Result<Self, IdentityError> {
        if raw.is_empty() {
            return Err(IdentityError::Empty);
        }
        let encoded = encode(&raw).ok();
        Ok(Self { raw, encoded })
    }

    pub fn raw(&self) -> &PublicKeyHex {
        &self.raw
    }

    pub fn encoded(&self) -> Option<&str> {
        self.encoded.as_deref()
    }

    /// Preferred display form: npub when known, hex otherwise
    pub fn display(&self) -> &str {
        self.encoded.as_deref().unwrap_or(self.raw.as_str())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
