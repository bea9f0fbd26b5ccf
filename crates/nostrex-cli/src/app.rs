//! CLI application wiring
//!
//! Opens the encrypted store, reads the stored settings and builds the
//! [`Nostrex`] facade over the real relay client.

use std::sync::Arc;

use nostrex_core::{
    EncryptedStore, FileNamespace, Settings, StoreSecret, SystemTimeSource, SETTINGS_KEY,
};
use nostrex_nostr::{
    ChainedSignerProvider, EnvSignerProvider, KeysSigner, NetworkClientFactory, Nostrex,
    NostrSdkClientFactory, SessionConfig, SignerProvider, StaticSignerProvider,
};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::Result;

pub struct NostrexApp {
    config: AppConfig,
    store: EncryptedStore,
    nostrex: Nostrex,
}

impl NostrexApp {
    /// Open the store under the configured data directory and wire the relay client
    pub fn new(config: AppConfig) -> Result<Self> {
        let data_dir = config.data_dir();
        info!("Using data directory {}", data_dir.display());

        let namespace = FileNamespace::open(&data_dir)?;
        let secret = StoreSecret::resolve(&config.storage.secret_env, &data_dir)?;
        let store = EncryptedStore::new(Arc::new(namespace), &secret);

        let settings: Settings = store.get_or_default(SETTINGS_KEY);
        let provider = signer_provider(&config, &settings);
        Ok(Self::assemble(config, store, &settings, provider, |session| {
            Arc::new(NostrSdkClientFactory::new(session))
        }))
    }

    /// Wire the app over explicit collaborators. `factory` receives the
    /// session configuration resolved from `config` and the stored settings.
    pub fn with_parts<F>(
        config: AppConfig,
        store: EncryptedStore,
        provider: Arc<dyn SignerProvider>,
        factory: F,
    ) -> Self
    where
        F: FnOnce(&SessionConfig) -> Arc<dyn NetworkClientFactory>,
    {
        let settings: Settings = store.get_or_default(SETTINGS_KEY);
        Self::assemble(config, store, &settings, provider, factory)
    }

    fn assemble<F>(
        config: AppConfig,
        store: EncryptedStore,
        settings: &Settings,
        provider: Arc<dyn SignerProvider>,
        factory: F,
    ) -> Self
    where
        F: FnOnce(&SessionConfig) -> Arc<dyn NetworkClientFactory>,
    {
        let session_config = config.session_config(settings.relays());
        debug!("Session relays: {:?}", session_config.relays);

        let factory = factory(&session_config);
        let nostrex = Nostrex::new(
            session_config,
            provider,
            factory,
            store.clone(),
            Arc::new(SystemTimeSource),
        );
        Self {
            config,
            store,
            nostrex,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn nostrex(&self) -> &Nostrex {
        &self.nostrex
    }

    pub fn settings(&self) -> Settings {
        self.store.get_or_default(SETTINGS_KEY)
    }

    /// Keys of the records in the store
    pub fn stored_keys(&self) -> Result<Vec<String>> {
        Ok(self.store.keys()?)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.store.set(SETTINGS_KEY, settings)?;
        Ok(())
    }

    /// Close any relay connections opened by the command
    pub async fn shutdown(&self) {
        self.nostrex.session().disconnect().await;
    }
}

/// Signer from the environment first, then the key stored in settings
pub fn signer_provider(config: &AppConfig, settings: &Settings) -> Arc<dyn SignerProvider> {
    let mut providers: Vec<Arc<dyn SignerProvider>> =
        vec![Arc::new(EnvSignerProvider::new(config.signer.env_var.clone()))];

    let stored_key = settings.nostr.private_key.trim();
    if config.signer.use_stored_key && !stored_key.is_empty() {
        match KeysSigner::from_secret(stored_key, "stored key") {
            Ok(signer) => providers.push(Arc::new(StaticSignerProvider::new(Arc::new(signer)))),
            Err(e) => warn!("Ignoring stored signing key: {}", e),
        }
    }

    Arc::new(ChainedSignerProvider::new(providers))
}
