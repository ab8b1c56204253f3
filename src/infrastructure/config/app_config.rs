//! Application configuration.

use std::path::PathBuf;

use clap::Parser;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

const APP_NAME: &str = "oxichat";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "oxichat";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Optional settings read from the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    /// WebSocket server url.
    #[serde(default)]
    pub server: Option<String>,

    /// Display name stamped on outgoing messages.
    #[serde(default)]
    pub name: Option<String>,

    /// Avatar reference stamped on outgoing messages.
    #[serde(default)]
    pub avatar: Option<String>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: Option<LogLevel>,
}

/// Application configuration from CLI arguments.
#[derive(Debug, Parser)]
#[command(name = APP_NAME, version, about = "A lightweight real-time chat client")]
pub struct AppConfig {
    /// WebSocket server url; the built-in loopback server is used when
    /// omitted.
    #[arg(long, env = "OXICHAT_SERVER")]
    pub server: Option<String>,

    /// Display name stamped on outgoing messages.
    #[arg(long)]
    pub name: Option<String>,

    /// Avatar reference stamped on outgoing messages.
    #[arg(long)]
    pub avatar: Option<String>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Log file path.
    #[arg(long)]
    pub log_path: Option<PathBuf>,

    /// Configuration file path.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl AppConfig {
    /// Loads the config file and fills unset CLI options from it.
    ///
    /// A missing file yields defaults; an unreadable file is logged and
    /// ignored.
    pub fn merge_with_file(&mut self) {
        let file = self.load_file_config();

        if self.server.is_none() {
            self.server = file.server;
        }
        if self.name.is_none() {
            self.name = file.name;
        }
        if self.avatar.is_none() {
            self.avatar = file.avatar;
        }
        if self.log_level.is_none() {
            self.log_level = file.log_level;
        }
    }

    fn load_file_config(&self) -> FileConfig {
        let Some(path) = self.effective_config_path() else {
            return FileConfig::default();
        };
        if !path.exists() {
            return FileConfig::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring malformed config file");
                FileConfig::default()
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config file");
                FileConfig::default()
            }
        }
    }

    /// Returns the effective log level.
    #[must_use]
    pub fn effective_log_level(&self) -> LogLevel {
        self.log_level.unwrap_or_default()
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("oxichat.log"))
    }

    /// Returns effective config path.
    #[must_use]
    pub fn effective_config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Self::default_config_path)
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}
