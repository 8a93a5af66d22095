//! Relay configuration
//!
//! Loaded from an optional JSON file, then overridden from `FORMRELAY_*`
//! environment variables. Every section has defaults, so an empty file (or no
//! file at all) yields a relay on `127.0.0.1:3000` with notifications off.

use crate::schema::{PollSchema, builtin, builtin_polls};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidEnv { key: String, message: String },

    #[error("Email suffix must start with '@': {0}")]
    InvalidSuffix(String),

    #[error("Notifications are enabled but the recipient {0:?} is not an email address")]
    InvalidRecipient(String),

    #[error("Unknown poll in overrides: {0}")]
    UnknownPoll(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub institution: InstitutionConfig,

    /// Admin digest, off unless enabled here or per poll
    #[serde(default)]
    pub notification: NotificationConfig,

    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Per-poll overrides keyed by slug
    #[serde(default)]
    pub polls: BTreeMap<String, PollOverride>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind: String,

    /// Directory of the static site served under `/`
    pub static_dir: Option<PathBuf>,

    /// Origins allowed to post forms; empty allows any
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            static_dir: None,
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one sheet file per poll
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("database"),
        }
    }
}

impl StorageConfig {
    pub fn sheet_path(&self, slug: &str) -> PathBuf {
        self.data_dir.join(format!("{}.sheet.gz", slug))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstitutionConfig {
    /// Short name used in validation messages
    pub name: String,

    /// Required ending of every submitter email, including the `@`
    pub email_suffix: String,
}

impl Default for InstitutionConfig {
    fn default() -> Self {
        Self {
            name: "UCR".to_string(),
            email_suffix: "@ucr.edu".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub recipient: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from: "Form Relay <noreply@localhost>".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollOverride {
    /// Deadline after which submissions are rejected
    pub closes_at: Option<DateTime<FixedOffset>>,

    /// Overrides `notification.enabled` for this poll
    pub notify: Option<bool>,
}

impl RelayConfig {
    /// Loads the file (if any), applies environment overrides and validates
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                log::info!("Loaded configuration from {}", path.display());
                serde_json::from_str(&contents)?
            }
            None => {
                log::info!("No config file given, using defaults");
                RelayConfig::default()
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `FORMRELAY_*` overrides read through `var`
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = var("FORMRELAY_BIND") {
            self.server.bind = bind;
        }
        if let Some(dir) = var("FORMRELAY_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(enabled) = var("FORMRELAY_NOTIFY") {
            self.notification.enabled = parse_env("FORMRELAY_NOTIFY", &enabled)?;
        }
        if let Some(recipient) = var("FORMRELAY_NOTIFY_RECIPIENT") {
            self.notification.recipient = recipient;
        }
        if let Some(password) = var("FORMRELAY_SMTP_PASSWORD") {
            self.smtp.password = password;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let suffix = &self.institution.email_suffix;
        if !suffix.starts_with('@') || suffix.len() < 2 {
            return Err(ConfigError::InvalidSuffix(suffix.clone()));
        }

        let recipients_needed = self.notification.enabled
            || self.polls.values().any(|p| p.notify == Some(true));
        if recipients_needed && !self.notification.recipient.contains('@') {
            return Err(ConfigError::InvalidRecipient(
                self.notification.recipient.clone(),
            ));
        }

        if let Some(slug) = self.polls.keys().find(|slug| builtin(slug).is_none()) {
            return Err(ConfigError::UnknownPoll(slug.clone()));
        }

        Ok(())
    }

    /// Built-in polls with their deadline overrides applied
    pub fn schemas(&self) -> Vec<PollSchema> {
        builtin_polls()
            .iter()
            .map(|schema| {
                let mut schema = schema.clone();
                if let Some(closes_at) = self.polls.get(&schema.slug).and_then(|p| p.closes_at) {
                    schema.closes_at = Some(closes_at);
                }
                schema
            })
            .collect()
    }

    /// Digest recipient for a poll, or None when its digest is off
    pub fn recipient_for(&self, slug: &str) -> Option<&str> {
        let enabled = self
            .polls
            .get(slug)
            .and_then(|p| p.notify)
            .unwrap_or(self.notification.enabled);

        enabled.then_some(self.notification.recipient.as_str())
    }

    pub fn any_notifications(&self) -> bool {
        builtin_polls()
            .iter()
            .any(|schema| self.recipient_for(&schema.slug).is_some())
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    value.parse().map_err(|e: T::Err| {
        log::warn!("Invalid {key} value: {e}");
        ConfigError::InvalidEnv {
            key: key.to_string(),
            message: e.to_string(),
        }
    })
}
