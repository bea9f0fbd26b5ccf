//! Error types for the nostrex core
//!
//! Identity parsing and persistence failures are kept as separate enums so
//! callers can tell "re-prompt the user" apart from "storage is unhappy".

use thiserror::Error;

// ----------------------------------------------------------------------------
// Identity Errors
// ----------------------------------------------------------------------------

/// Malformed user-supplied identity input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Invalid identity: input is empty")]
    Empty,

    #[error("Invalid identity: expected 64 hex characters, got {length}")]
    InvalidLength { length: usize },

    #[error("Invalid identity: not a hex string")]
    InvalidHex,

    #[error("Invalid identity: unsupported prefix in {input}")]
    UnsupportedPrefix { input: String },

    #[error("Invalid identity: bech32 decoding failed ({reason})")]
    InvalidBech32 { reason: String },

    #[error("Invalid identity: {raw} is not a valid public key")]
    NotEncodable { raw: String },
}

// ----------------------------------------------------------------------------
// Storage Errors
// ----------------------------------------------------------------------------

/// Errors related to durable storage and at-rest encryption
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage not available: {0}")]
    NotAvailable(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid store secret: {0}")]
    InvalidSecret(String),
}

/// Result type for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
