//! nostrex core
//!
//! Building blocks shared by the nostrex start page: the identity codec that
//! turns `npub` strings into canonical hex keys, the encrypted key/value store
//! used for everything persisted, the bounded retry primitive and the
//! persisted settings model. Nothing in this crate talks to the network.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod errors;
pub mod identity;
pub mod retry;
pub mod settings;
pub mod storage;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use errors::{IdentityError, StoreError, StoreResult};
pub use identity::{encode, normalize, try_normalize, Identity, PublicKeyHex};
pub use retry::{retry, Backoff, RetryOutcome, RetryPolicy};
pub use settings::{IdentityRecord, Settings, DEFAULT_RELAYS, IDENTITY_KEY, SETTINGS_KEY};
pub use storage::{
    DurableNamespace, EncryptedStore, FileNamespace, MemoryNamespace, StoreSecret, Vacancy,
};
pub use types::{ManualTimeSource, SystemTimeSource, TimeSource, Timestamp};
