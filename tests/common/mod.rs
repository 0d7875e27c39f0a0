//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use tempfile::TempDir;

use data_aggregator::config::DatabaseConfig;
use data_aggregator::pipeline::RunOptions;
use data_aggregator::ConnectionManager;

pub const NEWS_JSON: &str = include_str!("../fixtures/news.json");
pub const LOCATION_JSON: &str = include_str!("../fixtures/location.json");
pub const WEATHER_JSON: &str = include_str!("../fixtures/weather.json");
pub const CURRENCY_JSON: &str = include_str!("../fixtures/currency.json");
pub const CURRENCY_SINGLE_JSON: &str = include_str!("../fixtures/currency_single.json");

/// An address nothing listens on; requests fail fast with connection refused.
pub const DEAD_URL: &str = "http://127.0.0.1:9/";

pub const SCHEMA: &str = "digest";

/// Temporary data and reports directories, removed on drop.
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub data_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let data_dir = temp_dir.path().join("data");
        let reports_dir = temp_dir.path().join("reports");
        Self {
            temp_dir,
            data_dir,
            reports_dir,
        }
    }

    pub fn db_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            data_dir: self.data_dir.clone(),
            schema: Some(SCHEMA.to_string()),
        }
    }

    pub fn connections(&self) -> ConnectionManager {
        ConnectionManager::new(Some(self.db_config()), None, None)
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            reports_dir: self.reports_dir.clone(),
            ..RunOptions::default()
        }
    }

    pub fn report_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.reports_dir) {
            Ok(rd) => rd.flatten().map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
