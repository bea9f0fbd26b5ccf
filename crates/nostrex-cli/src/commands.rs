//! Command handlers for the nostrex CLI

use std::io::Write;

use nostrex_core::{encode, try_normalize};
use nostrex_nostr::{KeysSigner, ProfileSnapshot, SessionState};
use tracing::info;

use crate::app::NostrexApp;
use crate::cli::{Commands, ConfigCommand, SettingsCommand};
use crate::config::{validate_relay_url, AppConfig};
use crate::error::{CliError, Result};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command, writing human-readable output to `out`
    pub async fn execute(command: Commands, app: &NostrexApp, out: &mut dyn Write) -> Result<()> {
        let result = match command {
            Commands::Login => Self::handle_login(app, out).await,
            Commands::Logout => Self::handle_logout(app, out).await,
            Commands::Status => Self::handle_status(app, out),
            Commands::Profile { identity, force } => {
                Self::handle_profile(app, &identity, force, out).await
            }
            Commands::Normalize { identity } => Self::handle_normalize(&identity, out),
            Commands::Note { text } => Self::handle_note(app, &text, out).await,
            Commands::Settings { action } => Self::handle_settings(app, action, out),
            Commands::Config { action } => Self::handle_config(app, action, out),
        };
        app.shutdown().await;
        result
    }

    async fn handle_login(app: &NostrexApp, out: &mut dyn Write) -> Result<()> {
        info!("Logging in...");
        let user = match app.nostrex().login().await {
            Ok(user) => user,
            Err(e) => {
                writeln!(out, "{}", e.user_message())?;
                return Err(e.into());
            }
        };

        writeln!(out, "Logged in as {}", user.identity.display())?;
        match &user.profile {
            Some(profile) => print_profile(profile, out)?,
            None => writeln!(out, "No profile published yet")?,
        }
        Ok(())
    }

    async fn handle_logout(app: &NostrexApp, out: &mut dyn Write) -> Result<()> {
        app.nostrex().logout().await;
        writeln!(out, "Logged out")?;
        Ok(())
    }

    fn handle_status(app: &NostrexApp, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "nostrex status")?;
        writeln!(out, "==============")?;

        match app.nostrex().restore() {
            Some(record) => {
                let shown = if record.encoded_key.is_empty() {
                    &record.raw_key
                } else {
                    &record.encoded_key
                };
                writeln!(out, "Identity: {}", shown)?;
            }
            None => writeln!(out, "Identity: not logged in")?,
        }

        let settings = app.settings();
        if !settings.nostr.profile_name.is_empty() {
            writeln!(out, "Profile name: {}", settings.nostr.profile_name)?;
        }
        let has_key = !settings.nostr.private_key.is_empty();
        writeln!(out, "Stored signing key: {}", if has_key { "yes" } else { "no" })?;
        writeln!(out, "Signer variable: {}", app.config().signer.env_var)?;
        match app.stored_keys() {
            Ok(keys) if keys.is_empty() => writeln!(out, "Stored records: none")?,
            Ok(keys) => writeln!(out, "Stored records: {}", keys.join(", "))?,
            Err(e) => writeln!(out, "Stored records: unavailable ({})", e)?,
        }

        writeln!(out, "\nRelays:")?;
        for relay in &app.nostrex().session().config().relays {
            writeln!(out, "  {}", relay)?;
        }

        let session = match app.nostrex().session_state() {
            SessionState::Disconnected => "disconnected".to_string(),
            SessionState::Connecting => "connecting".to_string(),
            SessionState::Connected { relays, .. } => format!("connected to {} relays", relays.len()),
            SessionState::Failed { error } => format!("failed: {}", error),
        };
        writeln!(out, "\nSession: {}", session)?;
        Ok(())
    }

    async fn handle_profile(
        app: &NostrexApp,
        identity: &str,
        force: bool,
        out: &mut dyn Write,
    ) -> Result<()> {
        match app.nostrex().fetch_profile(identity, force).await {
            Some(profile) => {
                print_profile(&profile, out)?;
                Ok(())
            }
            None => {
                let message = app
                    .nostrex()
                    .error()
                    .await
                    .unwrap_or_else(|| "Profile lookup failed".to_string());
                writeln!(out, "{}", message)?;
                Err(CliError::Profile(message))
            }
        }
    }

    fn handle_normalize(identity: &str, out: &mut dyn Write) -> Result<()> {
        let raw = try_normalize(identity)?;
        writeln!(out, "hex:  {}", raw)?;
        writeln!(out, "npub: {}", encode(&raw)?)?;
        Ok(())
    }

    async fn handle_note(app: &NostrexApp, text: &str, out: &mut dyn Write) -> Result<()> {
        if text.trim().is_empty() {
            return Err(CliError::InvalidInput("note text is empty".to_string()));
        }
        let id = app.nostrex().publish_note(text).await?;
        writeln!(out, "Published note {}", id)?;
        Ok(())
    }

    fn handle_settings(app: &NostrexApp, action: SettingsCommand, out: &mut dyn Write) -> Result<()> {
        let mut settings = app.settings();
        match action {
            SettingsCommand::Show => {
                if !settings.nostr.private_key.is_empty() {
                    settings.nostr.private_key = "<redacted>".to_string();
                }
                writeln!(out, "{}", serde_json::to_string_pretty(&settings)?)?;
                return Ok(());
            }
            SettingsCommand::SetProfileName { name } => {
                settings.nostr.profile_name = name.trim().to_string();
                writeln!(out, "Profile name set to '{}'", settings.nostr.profile_name)?;
            }
            SettingsCommand::AddRelay { url } => {
                validate_relay_url(url.trim())?;
                if settings.add_relay(&url) {
                    writeln!(out, "Added relay {}", url.trim())?;
                } else {
                    writeln!(out, "Relay {} already configured", url.trim())?;
                    return Ok(());
                }
            }
            SettingsCommand::ImportKey { secret } => {
                let signer = KeysSigner::from_secret(&secret, "stored key")
                    .map_err(|e| CliError::InvalidInput(e.to_string()))?;
                let public_key = signer.keys().public_key().to_hex();
                settings.nostr.private_key = secret.trim().to_string();
                settings.nostr.public_key = public_key.clone();
                writeln!(out, "Imported key for {}", public_key)?;
            }
            SettingsCommand::ForgetKey => {
                settings.nostr.private_key.clear();
                settings.nostr.public_key.clear();
                writeln!(out, "Stored signing key removed")?;
            }
        }
        app.save_settings(&settings)
    }

    fn handle_config(app: &NostrexApp, action: ConfigCommand, out: &mut dyn Write) -> Result<()> {
        match action {
            ConfigCommand::Example => write!(out, "{}", AppConfig::example_config())?,
            ConfigCommand::Path => {
                match AppConfig::default_config_path() {
                    Some(path) => writeln!(out, "Config file: {}", path.display())?,
                    None => writeln!(out, "Config file: no user config directory")?,
                }
                writeln!(out, "Data directory: {}", app.config().data_dir().display())?;
            }
        }
        Ok(())
    }
}

fn print_profile(profile: &ProfileSnapshot, out: &mut dyn Write) -> std::io::Result<()> {
    if let Some(name) = profile.best_name() {
        writeln!(out, "Name:    {}", name)?;
    }
    let fields = [
        ("About", &profile.about),
        ("Picture", &profile.picture),
        ("Website", &profile.website),
        ("NIP-05", &profile.nip05),
        ("LN", &profile.lud16),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            writeln!(out, "{:<8} {}", format!("{}:", label), value)?;
        }
    }
    Ok(())
}
