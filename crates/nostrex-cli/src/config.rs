//! nostrex CLI configuration
//!
//! Configuration is layered with figment, lowest priority first:
//! - built-in defaults
//! - `nostrex.toml` in the working directory
//! - `config.toml` in the user config directory (`~/.config/nostrex/`)
//! - `NOSTREX_*` environment variables, nested with `__`
//!   (e.g. `NOSTREX_SESSION__WARM_UP_MS=0`)
//!
//! `--config FILE` replaces both file layers with the given file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use nostrex_core::RetryPolicy;
use nostrex_nostr::{SessionConfig, DEFAULT_SESSION_RELAYS};
use serde::{Deserialize, Serialize};

/// Local config file picked up from the working directory
pub const LOCAL_CONFIG_FILE: &str = "nostrex.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "NOSTREX_";

// ----------------------------------------------------------------------------
// Configuration Sections
// ----------------------------------------------------------------------------

/// Complete configuration for the nostrex CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionSection,
    pub storage: StorageSection,
    pub signer: SignerSection,
}

/// Relay set and timing, in plain numbers for hand-written TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Relays used unless the stored settings carry a user-edited list
    pub relays: Vec<String>,
    pub warm_up_ms: u64,
    pub detect_attempts: u32,
    pub detect_interval_ms: u64,
    pub key_attempts: u32,
    pub key_interval_ms: u64,
    pub connect_attempts: u32,
    pub connect_interval_ms: u64,
    pub settle_delay_ms: u64,
    pub fetch_timeout_secs: u64,
    pub profile_ttl_secs: u64,
}

/// Where and how the encrypted store lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Defaults to the platform data directory
    pub data_dir: Option<PathBuf>,
    /// Environment variable holding the store passphrase
    pub secret_env: String,
}

/// Where the signing key comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerSection {
    /// Environment variable holding an `nsec` or hex secret key
    pub env_var: String,
    /// Fall back to the key imported with `settings import-key`
    pub use_stored_key: bool,
}

impl Default for SessionSection {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            relays: DEFAULT_SESSION_RELAYS.iter().map(|r| r.to_string()).collect(),
            warm_up_ms: defaults.warm_up.as_millis() as u64,
            detect_attempts: defaults.detect_policy.max_attempts,
            detect_interval_ms: defaults.detect_policy.interval.as_millis() as u64,
            key_attempts: defaults.key_policy.max_attempts,
            key_interval_ms: defaults.key_policy.interval.as_millis() as u64,
            connect_attempts: defaults.connect_policy.max_attempts,
            connect_interval_ms: defaults.connect_policy.interval.as_millis() as u64,
            settle_delay_ms: defaults.settle_delay.as_millis() as u64,
            fetch_timeout_secs: defaults.fetch_timeout.as_secs(),
            profile_ttl_secs: defaults.profile_ttl.as_secs(),
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: None,
            secret_env: "NOSTREX_STORE_SECRET".to_string(),
        }
    }
}

impl Default for SignerSection {
    fn default() -> Self {
        Self {
            env_var: "NOSTREX_NSEC".to_string(),
            use_stored_key: true,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load with the standard layering
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(LOCAL_CONFIG_FILE));
        if let Some(path) = Self::default_config_path() {
            figment = figment.merge(Toml::file(path));
        }
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load from a specific file, environment overrides still applied
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::Loading(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment
            .extract()
            .map_err(|e| ConfigError::Loading(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// `~/.config/nostrex/config.toml` or the platform equivalent
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("nostrex").join("config.toml"))
    }

    /// Directory holding the encrypted store
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("nostrex")))
            .unwrap_or_else(|| PathBuf::from(".nostrex"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for relay in &self.session.relays {
            validate_relay_url(relay)?;
        }

        let attempts = [
            ("detect_attempts", self.session.detect_attempts),
            ("key_attempts", self.session.key_attempts),
            ("connect_attempts", self.session.connect_attempts),
        ];
        for (name, value) in attempts {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "session.{} must be at least 1",
                    name
                )));
            }
        }

        if self.session.fetch_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "session.fetch_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.storage.secret_env.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage.secret_env must name an environment variable".to_string(),
            ));
        }
        Ok(())
    }

    /// Session configuration; `relays` wins over the configured list when non-empty
    pub fn session_config(&self, relays: Option<&[String]>) -> SessionConfig {
        let s = &self.session;
        let ms = Duration::from_millis;
        SessionConfig {
            relays: s.relays.clone(),
            warm_up: ms(s.warm_up_ms),
            detect_policy: RetryPolicy::fixed(s.detect_attempts, ms(s.detect_interval_ms)),
            key_policy: RetryPolicy::fixed(s.key_attempts, ms(s.key_interval_ms)),
            connect_policy: RetryPolicy::fixed(s.connect_attempts, ms(s.connect_interval_ms)),
            settle_delay: ms(s.settle_delay_ms),
            fetch_timeout: Duration::from_secs(s.fetch_timeout_secs),
            profile_ttl: Duration::from_secs(s.profile_ttl_secs),
        }
        .with_relays(relays.unwrap_or_default().iter().cloned())
    }

    /// Example config file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| "# Failed to generate example config".to_string())
    }
}

/// Accept only `ws://` and `wss://` URLs
pub fn validate_relay_url(relay: &str) -> Result<(), ConfigError> {
    let url = url::Url::parse(relay)
        .map_err(|e| ConfigError::Validation(format!("invalid relay URL {}: {}", relay, e)))?;
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(ConfigError::Validation(format!(
            "relay URL {} must use ws:// or wss://, not {}://",
            relay, other
        ))),
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
