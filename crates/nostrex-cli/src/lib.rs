//! nostrex CLI library
//!
//! Command parsing, layered configuration and the command handlers behind
//! the `nostrex` binary.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use app::NostrexApp;
pub use cli::{Cli, Commands, ConfigCommand, SettingsCommand};
pub use commands::CommandDispatcher;
pub use config::{AppConfig, ConfigError};
pub use error::{CliError, Result};
