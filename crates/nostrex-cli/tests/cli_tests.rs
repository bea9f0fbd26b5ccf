//! Command handler tests over a real store and a fake relay network

use std::sync::Arc;

use nostr_sdk::Keys;
use nostrex_cli::app::{signer_provider, NostrexApp};
use nostrex_cli::{
    AppConfig, CliError, CommandDispatcher, Commands, ConfigCommand, SettingsCommand,
};
use nostrex_core::{EncryptedStore, FileNamespace, Settings, StoreSecret, SETTINGS_KEY};
use nostrex_nostr::testing::{FakeNetwork, ScriptedSignerProvider};
use nostrex_nostr::ProfileSnapshot;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    store: EncryptedStore,
    network: FakeNetwork,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let namespace = FileNamespace::open(dir.path()).unwrap();
        let store = EncryptedStore::new(
            Arc::new(namespace),
            &StoreSecret::from_passphrase("cli-tests").unwrap(),
        );
        Self {
            _dir: dir,
            store,
            network: FakeNetwork::new(),
        }
    }

    /// App whose signer comes from the stored settings, as in production
    fn app(&self) -> NostrexApp {
        self.app_with_config(AppConfig::default())
    }

    fn app_with_config(&self, config: AppConfig) -> NostrexApp {
        let settings: Settings = self.store.get_or_default(SETTINGS_KEY);
        let provider = signer_provider(&config, &settings);
        let factory = self.network.factory();
        NostrexApp::with_parts(config, self.store.clone(), provider, |_| Arc::new(factory))
    }

    fn app_without_signer(&self) -> NostrexApp {
        let factory = self.network.factory();
        NostrexApp::with_parts(
            AppConfig::default(),
            self.store.clone(),
            Arc::new(ScriptedSignerProvider::absent()),
            |_| Arc::new(factory),
        )
    }

    async fn run(&self, app: &NostrexApp, command: Commands) -> (Result<(), CliError>, String) {
        let mut out = Vec::new();
        let result = CommandDispatcher::execute(command, app, &mut out).await;
        (result, String::from_utf8(out).unwrap())
    }
}

fn settings(action: SettingsCommand) -> Commands {
    Commands::Settings { action }
}

#[tokio::test(start_paused = true)]
async fn test_imported_key_is_redacted_and_used_for_login() {
    let h = Harness::new();
    let keys = Keys::generate();
    let secret = keys.secret_key().unwrap().to_secret_hex();

    let (result, output) = h
        .run(&h.app(), settings(SettingsCommand::ImportKey { secret: secret.clone() }))
        .await;
    result.unwrap();
    assert!(output.contains(&keys.public_key().to_hex()));

    let (result, output) = h.run(&h.app(), settings(SettingsCommand::Show)).await;
    result.unwrap();
    assert!(output.contains("<redacted>"));
    assert!(!output.contains(&secret));

    let app = h.app();
    let (result, output) = h.run(&app, Commands::Login).await;
    result.unwrap();
    assert!(output.contains("Logged in as npub1"));
    assert!(output.contains("No profile published yet"));
    assert_eq!(h.network.builds(), 1);
    assert_eq!(h.network.disconnects(), 1);

    let (result, output) = h.run(&h.app(), Commands::Status).await;
    result.unwrap();
    assert!(output.contains("Identity: npub1"));
    assert!(output.contains("Stored signing key: yes"));
    assert!(output.contains("Stored records: nostr_user, nostrex-settings"));
}

#[tokio::test(start_paused = true)]
async fn test_login_without_signer_prints_user_message() {
    let h = Harness::new();

    let (result, output) = h.run(&h.app_without_signer(), Commands::Login).await;
    assert!(matches!(result, Err(CliError::Login(_))));
    assert!(output.contains("signer not found"));
    assert_eq!(h.network.builds(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_configured_relays_reach_the_session_on_a_fresh_store() {
    let h = Harness::new();
    let mut config = AppConfig::default();
    config.session.relays = vec!["ws://localhost:7777".to_string()];

    let app = h.app_with_config(config);
    assert_eq!(
        app.nostrex().session().config().relays,
        vec!["ws://localhost:7777".to_string()]
    );

    // Saving settings without touching the relay list keeps the configured relays
    let (result, _) = h
        .run(&app, settings(SettingsCommand::SetProfileName { name: "alice".into() }))
        .await;
    result.unwrap();
    let mut config = AppConfig::default();
    config.session.relays = vec!["ws://localhost:7777".to_string()];
    assert_eq!(
        h.app_with_config(config).nostrex().session().config().relays,
        vec!["ws://localhost:7777".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_add_relay_is_persisted_and_used() {
    let h = Harness::new();
    let relay = "wss://relay.example.com".to_string();

    let (result, _) = h
        .run(&h.app(), settings(SettingsCommand::AddRelay { url: relay.clone() }))
        .await;
    result.unwrap();

    let (result, output) = h
        .run(&h.app(), settings(SettingsCommand::AddRelay { url: relay.clone() }))
        .await;
    result.unwrap();
    assert!(output.contains("already configured"));

    let (result, _) = h
        .run(
            &h.app(),
            settings(SettingsCommand::AddRelay {
                url: "https://not-a-relay.example.com".into(),
            }),
        )
        .await;
    assert!(matches!(result, Err(CliError::Config(_))));

    let stored: Settings = h.store.get_or_default(SETTINGS_KEY);
    assert_eq!(stored.nostr.default_relays.iter().filter(|r| **r == relay).count(), 1);
    assert!(h.app().nostrex().session().config().relays.contains(&relay));
}

#[tokio::test(start_paused = true)]
async fn test_normalize_prints_both_forms() {
    let h = Harness::new();
    let hex = Keys::generate().public_key().to_hex();

    let (result, output) = h
        .run(&h.app(), Commands::Normalize { identity: hex.to_uppercase() })
        .await;
    result.unwrap();
    assert!(output.contains(&format!("hex:  {}", hex)));
    assert!(output.contains("npub: npub1"));

    let (result, _) = h
        .run(&h.app(), Commands::Normalize { identity: "npub1nope".into() })
        .await;
    assert!(matches!(result, Err(CliError::Identity(_))));
}

#[tokio::test(start_paused = true)]
async fn test_profile_lookup_reports_invalid_identity() {
    let h = Harness::new();

    let (result, output) = h
        .run(
            &h.app(),
            Commands::Profile {
                identity: "not-a-key".into(),
                force: false,
            },
        )
        .await;
    assert!(matches!(result, Err(CliError::Profile(_))));
    assert!(output.contains("not a valid"));
    assert_eq!(h.network.builds(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_profile_lookup_needs_no_signer() {
    let h = Harness::new();
    let friend = Keys::generate().public_key().to_hex();
    h.network.set_profile(
        &friend,
        ProfileSnapshot {
            name: Some("heidi".into()),
            ..ProfileSnapshot::default()
        },
    );

    let (result, output) = h
        .run(
            &h.app_without_signer(),
            Commands::Profile {
                identity: friend,
                force: false,
            },
        )
        .await;
    result.unwrap();
    assert!(output.contains("heidi"));
    assert_eq!(h.network.unsigned_builds(), 1);
    assert_eq!(h.network.disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_forget_key_clears_settings() {
    let h = Harness::new();
    let secret = Keys::generate().secret_key().unwrap().to_secret_hex();

    h.run(&h.app(), settings(SettingsCommand::ImportKey { secret }))
        .await
        .0
        .unwrap();
    h.run(&h.app(), settings(SettingsCommand::ForgetKey))
        .await
        .0
        .unwrap();

    let stored: Settings = h.store.get_or_default(SETTINGS_KEY);
    assert!(stored.nostr.private_key.is_empty());
    assert!(stored.nostr.public_key.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_config_example_is_loadable() {
    let h = Harness::new();

    let (result, output) = h
        .run(&h.app(), Commands::Config { action: ConfigCommand::Example })
        .await;
    result.unwrap();
    assert!(output.contains("[session]"));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nostrex.toml");
    std::fs::write(&path, output).unwrap();
    assert_eq!(AppConfig::load_from_file(&path).unwrap(), AppConfig::default());
    assert_eq!(h.network.builds(), 0);
}
