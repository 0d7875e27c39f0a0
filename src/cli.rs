// src/cli.rs
use clap::Parser;
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::ingest::Service;
use crate::pipeline::RunOptions;
use crate::report::MAX_ENTRY_COUNT;
use crate::retention::{self, MAX_RETENTION_DAYS};

/// Fetch news, weather and currency data, store it, and mail a JSON digest.
#[derive(Parser, Debug, Clone)]
#[command(name = "data-aggregator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Number of news entries in the report (1-10)
    #[arg(short = 'c', long = "count", value_parser = clap::value_parser!(u8).range(1..=MAX_ENTRY_COUNT as i64))]
    pub count: Option<u8>,

    /// Services to run, comma separated
    #[arg(short = 's', long = "service", value_enum, value_delimiter = ',')]
    pub services: Vec<Service>,

    /// Config file (TOML or JSON)
    #[arg(long, env = "AGGREGATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Delete reports older than this many days
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=MAX_RETENTION_DAYS))]
    pub retention_days: Option<u64>,

    /// Repeat the run every N seconds instead of exiting
    #[arg(long)]
    pub interval_secs: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Merge CLI overrides over the `[reports]` section.
    pub fn run_options(&self, cfg: &AppConfig) -> RunOptions {
        let mut services = Vec::new();
        for s in &self.services {
            if !services.contains(s) {
                services.push(*s);
            }
        }
        if services.is_empty() {
            services = Service::ALL.to_vec();
        }

        RunOptions {
            services,
            // Both sources are range-checked: clap here, `AppConfig` on load.
            entry_count: self
                .count
                .map(usize::from)
                .unwrap_or(cfg.reports.entry_count),
            reports_dir: cfg.reports.dir.clone(),
            retention: retention::days(self.retention_days.unwrap_or(cfg.reports.retention_days)),
            ..RunOptions::default()
        }
    }
}
