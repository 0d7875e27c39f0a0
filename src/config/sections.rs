// src/config/sections.rs
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::ENV_SMTP_PASSWORD;
use crate::error::ConfigError;

fn default_timeout_secs() -> u64 {
    10
}
fn default_smtp_port() -> u16 {
    587
}
fn default_ssh_port() -> u16 {
    22
}
fn default_location_url() -> String {
    "https://ipinfo.io".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}
fn default_retention_days() -> u64 {
    30
}
fn default_entry_count() -> usize {
    5
}

/// `[database]`: where schema files live and which schema the run writes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Optional in the document; provisioning fails without it.
    #[serde(default)]
    pub schema: Option<String>,
}

/// `[mail]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub sender_email: String,
    /// "ENV" means: read from AGGREGATOR_SMTP_PASSWORD
    pub password: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The SMTP password, reading [`ENV_SMTP_PASSWORD`] when the document
    /// says `"ENV"`.
    pub fn resolved_password(&self) -> Result<String, ConfigError> {
        if !self.password.trim().eq_ignore_ascii_case("env") {
            return Ok(self.password.clone());
        }
        std::env::var(ENV_SMTP_PASSWORD).map_err(|_| ConfigError::MissingKey {
            section: "mail",
            key: "password",
        })
    }
}

/// `[remote-shell]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteShellConfig {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// `[news-source]` and `[currency-source]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[weather-source]`: the weather endpoint plus the location lookup used
/// to resolve coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSourceConfig {
    pub url: String,
    #[serde(default = "default_location_url")]
    pub location_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl WeatherSourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[reports]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default = "default_reports_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
    #[serde(default = "default_entry_count")]
    pub entry_count: usize,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            dir: default_reports_dir(),
            retention_days: default_retention_days(),
            entry_count: default_entry_count(),
        }
    }
}
