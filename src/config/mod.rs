// src/config/mod.rs
//! Structured configuration for one aggregation run.
//!
//! The document is TOML or JSON (picked by extension) with one optional
//! section per collaborator. Components receive only their own typed section;
//! a missing section surfaces as [`ConfigError::Missing`] at the point where
//! it is actually needed.

pub mod sections;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::report::MAX_ENTRY_COUNT;
pub use sections::{
    DatabaseConfig, MailConfig, RemoteShellConfig, ReportsConfig, SourceConfig,
    WeatherSourceConfig,
};

pub const ENV_CONFIG_PATH: &str = "AGGREGATOR_CONFIG";
pub const ENV_SMTP_PASSWORD: &str = "AGGREGATOR_SMTP_PASSWORD";
pub const DEFAULT_TOML_PATH: &str = "config/aggregator.toml";
pub const DEFAULT_JSON_PATH: &str = "config/aggregator.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppConfig {
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub mail: Option<MailConfig>,
    #[serde(default)]
    pub remote_shell: Option<RemoteShellConfig>,
    #[serde(default)]
    pub news_source: Option<SourceConfig>,
    #[serde(default)]
    pub weather_source: Option<WeatherSourceConfig>,
    #[serde(default)]
    pub currency_source: Option<SourceConfig>,
    #[serde(default)]
    pub reports: ReportsConfig,
}

impl AppConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = Self::parse(&content, ext.as_str()).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;
        cfg.validate()?;
        tracing::info!(target: "config", path = %path.display(), "config loaded");
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $AGGREGATOR_CONFIG
    /// 2) config/aggregator.toml
    /// 3) config/aggregator.json
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            return Self::load_from(&PathBuf::from(p));
        }
        for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
            let p = PathBuf::from(candidate);
            if p.exists() {
                return Self::load_from(&p);
            }
        }
        Err(ConfigError::NotFound)
    }

    fn parse(s: &str, hint_ext: &str) -> Result<Self, String> {
        if hint_ext == "json" {
            return serde_json::from_str(s).map_err(|e| e.to_string());
        }
        match toml::from_str(s) {
            Ok(v) => Ok(v),
            // Unknown extension: give JSON a chance before reporting the TOML error.
            Err(e) if hint_ext != "toml" => serde_json::from_str(s).map_err(|_| e.to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Range checks that the document format itself cannot express.
    /// Secrets are not resolved here; a missing mail password only
    /// surfaces when the mail transport is first opened.
    fn validate(&self) -> Result<(), ConfigError> {
        let n = self.reports.entry_count;
        if !(1..=MAX_ENTRY_COUNT).contains(&n) {
            return Err(ConfigError::OutOfRange {
                section: "reports",
                key: "entry_count",
                value: n.to_string(),
                expected: "1..=10",
            });
        }
        Ok(())
    }

    pub fn require_database(&self) -> Result<&DatabaseConfig, ConfigError> {
        self.database
            .as_ref()
            .ok_or(ConfigError::Missing { section: "database" })
    }

    pub fn require_mail(&self) -> Result<&MailConfig, ConfigError> {
        self.mail
            .as_ref()
            .ok_or(ConfigError::Missing { section: "mail" })
    }

    pub fn require_remote_shell(&self) -> Result<&RemoteShellConfig, ConfigError> {
        self.remote_shell
            .as_ref()
            .ok_or(ConfigError::Missing {
                section: "remote-shell",
            })
    }

    pub fn require_news_source(&self) -> Result<&SourceConfig, ConfigError> {
        self.news_source.as_ref().ok_or(ConfigError::Missing {
            section: "news-source",
        })
    }

    pub fn require_weather_source(&self) -> Result<&WeatherSourceConfig, ConfigError> {
        self.weather_source.as_ref().ok_or(ConfigError::Missing {
            section: "weather-source",
        })
    }

    pub fn require_currency_source(&self) -> Result<&SourceConfig, ConfigError> {
        self.currency_source.as_ref().ok_or(ConfigError::Missing {
            section: "currency-source",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TOML: &str = r#"
[database]
data_dir = "/tmp/agg"
schema = "digest"

[news-source]
url = "https://news.example/top"

[weather-source]
url = "https://weather.example/v1/forecast"
timeout_secs = 3

[reports]
entry_count = 7
"#;

    #[test]
    fn toml_sections_and_defaults() {
        let cfg = AppConfig::parse(SAMPLE_TOML, "toml").unwrap();
        let db = cfg.require_database().unwrap();
        assert_eq!(db.schema.as_deref(), Some("digest"));
        assert_eq!(cfg.require_news_source().unwrap().timeout_secs, 10);

        let w = cfg.require_weather_source().unwrap();
        assert_eq!(w.timeout_secs, 3);
        assert_eq!(w.location_url, "https://ipinfo.io");

        assert_eq!(cfg.reports.entry_count, 7);
        assert_eq!(cfg.reports.retention_days, 30);
    }

    #[test]
    fn missing_section_names_it() {
        let cfg = AppConfig::parse(SAMPLE_TOML, "toml").unwrap();
        let err = cfg.require_currency_source().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                section: "currency-source"
            }
        ));
        assert!(err.to_string().contains("currency-source"));
    }

    #[test]
    fn json_document_parses() {
        let json = r#"{"remote-shell": {"host": "h", "username": "u"}}"#;
        let cfg = AppConfig::parse(json, "json").unwrap();
        let ssh = cfg.require_remote_shell().unwrap();
        assert_eq!(ssh.port, 22);
        assert!(cfg.database.is_none());
    }

    #[test]
    fn entry_count_outside_one_to_ten_is_rejected() {
        let mut cfg = AppConfig::parse(SAMPLE_TOML, "toml").unwrap();
        cfg.validate().unwrap();

        cfg.reports.entry_count = 11;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutOfRange { key: "entry_count", .. })
        ));
        cfg.reports.entry_count = 0;
        assert!(cfg.validate().is_err());
    }
}
