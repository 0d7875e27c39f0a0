// src/report.rs
//! Report compilation: a bounded JSON snapshot of the newest rows.

use chrono::{DateTime, Local};
use metrics::counter;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::connections::{ConnectionManager, SchemaMode};
use crate::error::ReportError;
use crate::store::{fetch_recent, Record};

pub const DEFAULT_ENTRY_COUNT: usize = 5;
pub const MAX_ENTRY_COUNT: usize = 10;

const NEWS_COLUMNS: &[&str] = &["headline", "source", "url", "published_at"];
const WEATHER_COLUMNS: &[&str] = &["city", "temperature", "humidity", "timestamp"];
const CURRENCY_COLUMNS: &[&str] = &["base", "target", "rate", "timestamp"];
const IDENTITY: &str = "id";

/// The report document. `weather` is an empty object when there is no row.
#[derive(Debug, Clone, Serialize)]
pub struct ReportArtifact {
    pub news: Vec<Record>,
    pub weather: Record,
    pub currency: Vec<Record>,
}

/// `auto_report_<YYYY-MM-DD_HH-MM-SS>.json`
pub fn report_file_name(run_at: &DateTime<Local>) -> String {
    format!("auto_report_{}.json", run_at.format("%Y-%m-%d_%H-%M-%S"))
}

pub struct ReportCompiler {
    reports_dir: PathBuf,
    entry_count: usize,
}

impl ReportCompiler {
    /// `entry_count` of `None` uses [`DEFAULT_ENTRY_COUNT`].
    pub fn new(reports_dir: impl Into<PathBuf>, entry_count: Option<usize>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            entry_count: entry_count.unwrap_or(DEFAULT_ENTRY_COUNT),
        }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// Read back the newest rows for every table.
    pub fn collect(&self, conns: &mut ConnectionManager) -> Result<ReportArtifact, ReportError> {
        let db = conns
            .database(SchemaMode::Selected)
            .map_err(crate::error::PersistenceError::from)?;

        let news = fetch_recent(db, "news", Some(NEWS_COLUMNS), IDENTITY, self.entry_count)?;
        let weather = fetch_recent(db, "weather", Some(WEATHER_COLUMNS), IDENTITY, 1)?
            .into_iter()
            .next()
            .unwrap_or_default();
        let currency = fetch_recent(db, "currency", Some(CURRENCY_COLUMNS), IDENTITY, 1)?;

        Ok(ReportArtifact {
            news,
            weather,
            currency,
        })
    }

    /// Compile and write the report for the run started at `run_at`.
    /// Returns the path of the new file.
    pub fn compile(
        &self,
        conns: &mut ConnectionManager,
        run_at: &DateTime<Local>,
    ) -> Result<PathBuf, ReportError> {
        let artifact = self.collect(conns)?;
        let path = self.write(&artifact, run_at)?;
        counter!("aggregator_reports_total").increment(1);
        tracing::info!(
            target: "report",
            path = %path.display(),
            news = artifact.news.len(),
            weather = !artifact.weather.is_empty(),
            currency = artifact.currency.len(),
            "report generated"
        );
        Ok(path)
    }

    fn write(&self, artifact: &ReportArtifact, run_at: &DateTime<Local>) -> Result<PathBuf, ReportError> {
        std::fs::create_dir_all(&self.reports_dir).map_err(|source| ReportError::ReportsDir {
            path: self.reports_dir.clone(),
            source,
        })?;

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        artifact.serialize(&mut ser)?;

        let path = self.reports_dir.join(report_file_name(run_at));
        let write_err = |source| ReportError::Write {
            path: path.clone(),
            source,
        };
        // Artifacts are immutable: never overwrite an existing report.
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(write_err)?;
        file.write_all(&buf).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        Ok(path)
    }
}
