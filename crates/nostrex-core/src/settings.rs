//! Persisted user state
//!
//! Everything here is stored through the [`EncryptedStore`](crate::storage::EncryptedStore)
//! under a fixed key. Records are camelCase on disk and every section is
//! `#[serde(default)]`, so a record written by an older build merges over the
//! current defaults field by field.

use serde::{Deserialize, Serialize};

use crate::identity::{Identity, PublicKeyHex};
use crate::storage::Vacancy;

/// Storage key of the [`Settings`] record
pub const SETTINGS_KEY: &str = "nostrex-settings";

/// Storage key of the authenticated [`IdentityRecord`]
pub const IDENTITY_KEY: &str = "nostr_user";

/// Relays a fresh installation starts with
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.nostr.band",
];

// ----------------------------------------------------------------------------
// Identity Record
// ----------------------------------------------------------------------------

/// The logged-in user as persisted between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    /// `npub1...`, or empty when the key could not be encoded
    pub encoded_key: String,
    /// Canonical hex key
    pub raw_key: String,
}

impl IdentityRecord {
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            encoded_key: identity.encoded().unwrap_or_default().to_string(),
            raw_key: identity.raw().to_string(),
        }
    }

    /// Rebuild the identity, `None` if the stored key no longer normalizes
    pub fn identity(&self) -> Option<Identity> {
        Identity::parse(&self.raw_key).ok()
    }

    pub fn raw(&self) -> PublicKeyHex {
        crate::identity::normalize(&self.raw_key)
    }
}

impl Vacancy for IdentityRecord {
    fn is_vacant(&self) -> bool {
        self.raw_key.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Settings
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiSettings {
    pub theme: Theme,
    pub is_dark_mode: bool,
    pub compact_mode: bool,
    pub show_clock: bool,
    pub show_logo: bool,
    pub show_search_box: bool,
    pub show_shortcuts: bool,
    pub show_profile: bool,
    pub language: String,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            is_dark_mode: false,
            compact_mode: false,
            show_clock: true,
            show_logo: true,
            show_search_box: true,
            show_shortcuts: true,
            show_profile: true,
            language: "en".to_string(),
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NostrSettings {
    pub public_key: String,
    /// Local signing key; only ever persisted encrypted
    pub private_key: String,
    pub default_relays: Vec<String>,
    pub profile_name: String,
}

impl Default for NostrSettings {
    fn default() -> Self {
        Self {
            public_key: String::new(),
            private_key: String::new(),
            default_relays: DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect(),
            profile_name: String::new(),
        }
    }
}

impl core::fmt::Debug for NostrSettings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NostrSettings")
            .field("public_key", &self.public_key)
            .field("private_key", &if self.private_key.is_empty() { "" } else { "<redacted>" })
            .field("default_relays", &self.default_relays)
            .field("profile_name", &self.profile_name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecuritySettings {
    pub privacy_mode: bool,
    pub encrypt_data: bool,
    pub auto_lock: bool,
    /// Minutes
    pub lock_timeout: u32,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            privacy_mode: false,
            encrypt_data: true,
            auto_lock: true,
            lock_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shortcut {
    pub name: String,
    pub url: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub auto_sync: bool,
    pub notifications: bool,
    pub notification_sound: bool,
    pub shortcuts: Vec<Shortcut>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_sync: true,
            notifications: true,
            notification_sound: true,
            shortcuts: Vec::new(),
        }
    }
}

/// All user-configurable state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ui: UiSettings,
    pub nostr: NostrSettings,
    pub security: SecuritySettings,
    pub app: AppSettings,
}

impl Settings {
    /// Relays the user picked, `None` when the list is empty or still the
    /// built-in [`DEFAULT_RELAYS`]
    pub fn relays(&self) -> Option<&[String]> {
        let relays = &self.nostr.default_relays;
        let untouched = relays.len() == DEFAULT_RELAYS.len()
            && relays.iter().zip(DEFAULT_RELAYS).all(|(r, d)| r == d);
        if relays.is_empty() || untouched {
            None
        } else {
            Some(relays)
        }
    }

    /// Add a relay if not already present; returns whether it was added
    pub fn add_relay(&mut self, url: &str) -> bool {
        let url = url.trim();
        if url.is_empty() || self.nostr.default_relays.iter().any(|r| r == url) {
            return false;
        }
        self.nostr.default_relays.push(url.to_string());
        true
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
