//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Directory holding the encrypted store
    #[arg(short, long)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect a signer, connect to relays and remember the identity
    Login,
    /// Forget the remembered identity
    Logout,
    /// Show the remembered identity and configured relays
    Status,
    /// Look up a profile by npub or hex public key
    Profile {
        /// npub or 64-character hex public key
        identity: String,
        /// Bypass the profile cache
        #[arg(short, long)]
        force: bool,
    },
    /// Print the canonical hex and npub forms of a public key
    Normalize {
        /// npub or 64-character hex public key
        identity: String,
    },
    /// Publish a short text note
    Note {
        /// Note content
        text: String,
    },
    /// Inspect or change stored settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
    /// Inspect the CLI configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print a config file populated with the defaults
    Example,
    /// Print where configuration and data are read from
    Path,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Print the stored settings (secret key redacted)
    Show,
    /// Set the display name shown on the start page
    SetProfileName { name: String },
    /// Add a relay to the stored relay list
    AddRelay { url: String },
    /// Store a local signing key (nsec or hex)
    ImportKey { secret: String },
    /// Remove the stored signing key
    ForgetKey,
}
